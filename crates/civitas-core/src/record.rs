use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::errors::{RecordError, Result};
use crate::schema::EntitySchema;
use crate::value::{Value, NULL};

/// Store-assigned row identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId(id)
    }
}

/// Field name to value map used for writes and loaded rows
pub type Attributes = BTreeMap<String, Value>;

/// Derived, read-only attribute
pub type ComputedFn = fn(&Record) -> Value;

/// Build an `Attributes` map from `key => value` pairs
///
/// ```
/// use civitas_core::attributes;
/// use civitas_core::Value;
///
/// let attrs = attributes! { "title" => "Spring Gala", "capacity" => 120 };
/// assert_eq!(attrs["capacity"], Value::Integer(120));
/// ```
#[macro_export]
macro_rules! attributes {
    () => {
        $crate::record::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::record::Attributes::new();
        $(
            attrs.insert(($key).to_string(), $crate::value::Value::from($value));
        )+
        attrs
    }};
}

/// Parse a JSON object (CLI payloads, seed rows) into attributes
pub fn attributes_from_json(json: JsonValue) -> Result<Attributes> {
    match json {
        JsonValue::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect()),
        other => Err(RecordError::Serialization {
            message: format!("expected a JSON object of fields, got {}", other),
        }),
    }
}

/// A persisted row with its typed attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity: String,
    pub id: RecordId,
    pub attributes: Attributes,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Value of a declared field, `Null` when unset
    pub fn get(&self, field: &str) -> &Value {
        self.attributes.get(field).unwrap_or(&NULL)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).as_text()
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        self.get(field).as_i64()
    }

    pub fn decimal(&self, field: &str) -> Option<f64> {
        self.get(field).as_f64()
    }

    pub fn boolean(&self, field: &str) -> Option<bool> {
        self.get(field).as_bool()
    }

    pub fn datetime(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).as_datetime()
    }

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.get(field).as_date()
    }

    pub fn json(&self, field: &str) -> Option<&JsonValue> {
        self.get(field).as_json()
    }

    pub fn foreign_id(&self, field: &str) -> Option<RecordId> {
        self.integer(field).map(RecordId)
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Evaluate a computed attribute declared on `schema`
    pub fn computed(&self, schema: &EntitySchema, name: &str) -> Option<Value> {
        schema
            .appends()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, compute)| compute(self))
    }

    /// Serialized form: hidden fields dropped, computed attributes appended
    pub fn to_json(&self, schema: &EntitySchema) -> JsonValue {
        let mut out = Map::new();
        out.insert("id".to_string(), JsonValue::from(self.id.0));

        for field in schema.fields() {
            if field.hidden {
                continue;
            }
            out.insert(field.name.clone(), self.get(&field.name).to_json());
        }

        let stamp = |ts: Option<DateTime<Utc>>| Value::from(ts).to_json();
        if schema.timestamps() {
            out.insert("created_at".to_string(), stamp(self.created_at));
            out.insert("updated_at".to_string(), stamp(self.updated_at));
        }
        if schema.soft_deletes() {
            out.insert("deleted_at".to_string(), stamp(self.deleted_at));
        }

        for (name, compute) in schema.appends() {
            out.insert(name.clone(), compute(self).to_json());
        }
        JsonValue::Object(out)
    }
}

/// A belongs-to-many result: the related record plus its join-row columns
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRecord {
    pub record: Record,
    pub pivot: Attributes,
}
