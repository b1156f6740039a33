//! Composable record queries
//!
//! A `Query` is a plain description of a filtered, ordered read against one
//! entity. Builder methods and named scopes only append to it; nothing runs
//! until the store executes it. `checked()` validates column names and casts
//! predicate values to their column types so the store renders only typed
//! values.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::{RecordError, Result};
use crate::schema::{EntitySchema, FieldType};
use crate::value::{Value, NULL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

/// One restriction on the rows a query returns
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: Comparison,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        field: String,
        negated: bool,
    },
    /// SQL LIKE with `\` as the escape character
    Like { field: String, pattern: String },
    /// A JSON array column contains `value` as one of its elements
    JsonContains { field: String, value: Value },
    /// Any one of the inner predicates holds
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.to_string(),
            op: Comparison::Eq,
            value: value.into(),
        }
    }

    pub fn compare(field: &str, op: Comparison, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn is_null(field: &str) -> Self {
        Predicate::Null {
            field: field.to_string(),
            negated: false,
        }
    }

    pub fn contains(field: &str, needle: &str) -> Self {
        Predicate::Like {
            field: field.to_string(),
            pattern: format!("%{}%", escape_like(needle)),
        }
    }
}

/// Escape LIKE metacharacters so `needle` matches literally
pub fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Soft-delete visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trashed {
    #[default]
    Exclude,
    Include,
    Only,
}

/// Named scope implementation
pub type ScopeFn = Arc<dyn Fn(Query, &ScopeArgs) -> Result<Query> + Send + Sync>;

/// Arguments handed to a scope, with typed accessors
#[derive(Debug, Clone)]
pub struct ScopeArgs {
    entity: String,
    scope: String,
    values: Vec<Value>,
    now: DateTime<Utc>,
}

impl ScopeArgs {
    pub fn new(entity: &str, scope: &str, values: Vec<Value>, now: DateTime<Utc>) -> Self {
        Self {
            entity: entity.to_string(),
            scope: scope.to_string(),
            values,
            now,
        }
    }

    /// Reference time for time-relative scopes
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw argument, `Null` when absent
    pub fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&NULL)
    }

    fn invalid(&self, reason: String) -> RecordError {
        RecordError::InvalidScopeArgs {
            entity: self.entity.clone(),
            scope: self.scope.clone(),
            reason,
        }
    }

    fn cast(&self, index: usize, ty: FieldType) -> Result<Value> {
        let value = self.value(index).clone();
        if value.is_null() {
            return Err(self.invalid(format!("argument {} is required", index + 1)));
        }
        ty.cast(value)
            .map_err(|reason| self.invalid(format!("argument {}: {}", index + 1, reason)))
    }

    pub fn text(&self, index: usize) -> Result<String> {
        match self.cast(index, FieldType::Text)? {
            Value::Text(s) => Ok(s),
            other => Err(self.invalid(format!("argument {} is {}", index + 1, other.kind_name()))),
        }
    }

    pub fn integer(&self, index: usize) -> Result<i64> {
        self.cast(index, FieldType::Integer)?
            .as_i64()
            .ok_or_else(|| self.invalid(format!("argument {} is not an integer", index + 1)))
    }

    pub fn decimal(&self, index: usize) -> Result<f64> {
        self.cast(index, FieldType::Decimal { scale: None })?
            .as_f64()
            .ok_or_else(|| self.invalid(format!("argument {} is not a number", index + 1)))
    }

    pub fn datetime(&self, index: usize) -> Result<DateTime<Utc>> {
        self.cast(index, FieldType::DateTime)?
            .as_datetime()
            .ok_or_else(|| self.invalid(format!("argument {} is not a date-time", index + 1)))
    }

    /// Integer argument that may be omitted
    pub fn integer_or(&self, index: usize, default: i64) -> Result<i64> {
        if self.value(index).is_null() {
            Ok(default)
        } else {
            self.integer(index)
        }
    }
}

/// A filtered, ordered read against one entity
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<EntitySchema>,
    predicates: Vec<Predicate>,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    trashed: Trashed,
}

impl Query {
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            trashed: Trashed::default(),
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn entity(&self) -> &str {
        self.schema.name()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn trashed(&self) -> Trashed {
        self.trashed
    }

    /// Ordering the store applies
    ///
    /// Explicit orderings come first; `id ASC` always closes the list so
    /// results are deterministic.
    pub fn ordering(&self) -> Vec<OrderBy> {
        let mut order = self.order.clone();
        if !order.iter().any(|o| o.field == "id") {
            order.push(OrderBy::asc("id"));
        }
        order
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    fn compare(self, field: &str, op: Comparison, value: impl Into<Value>) -> Self {
        self.filter(Predicate::compare(field, op, value))
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Eq, value)
    }

    pub fn where_ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Ne, value)
    }

    pub fn where_gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Gt, value)
    }

    pub fn where_gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Gte, value)
    }

    pub fn where_lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Lt, value)
    }

    pub fn where_lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Lte, value)
    }

    pub fn where_in<V: Into<Value>>(
        self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    pub fn where_not_in<V: Into<Value>>(
        self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    pub fn where_null(self, field: &str) -> Self {
        self.filter(Predicate::is_null(field))
    }

    pub fn where_not_null(self, field: &str) -> Self {
        self.filter(Predicate::Null {
            field: field.to_string(),
            negated: true,
        })
    }

    /// Raw LIKE pattern; `%` and `_` keep their wildcard meaning
    pub fn where_like(self, field: &str, pattern: &str) -> Self {
        self.filter(Predicate::Like {
            field: field.to_string(),
            pattern: pattern.to_string(),
        })
    }

    /// Case-insensitive (ASCII) substring match
    pub fn where_contains(self, field: &str, needle: &str) -> Self {
        self.filter(Predicate::contains(field, needle))
    }

    pub fn where_json_contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::JsonContains {
            field: field.to_string(),
            value: value.into(),
        })
    }

    /// At least one of `predicates` holds
    pub fn where_any(self, predicates: Vec<Predicate>) -> Self {
        self.filter(Predicate::Any(predicates))
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Newest first by creation time
    pub fn latest(self) -> Self {
        self.order_by("created_at", Direction::Desc)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.trashed = Trashed::Include;
        self
    }

    pub fn only_trashed(mut self) -> Self {
        self.trashed = Trashed::Only;
        self
    }

    /// Apply a named scope registered on the entity
    ///
    /// Scopes compose: each one adds its restrictions to whatever the query
    /// already has, so chained scopes are ANDed together.
    pub fn scope(self, name: &str, args: &[Value]) -> Result<Query> {
        self.scope_at(name, args, Utc::now())
    }

    /// `scope` with an explicit reference time for time-relative scopes
    pub fn scope_at(self, name: &str, args: &[Value], now: DateTime<Utc>) -> Result<Query> {
        let scope = self.schema.scope(name)?.clone();
        let args = ScopeArgs::new(self.schema.name(), name, args.to_vec(), now);
        scope(self, &args)
    }

    /// Validate columns and cast every predicate value to its column type
    pub fn checked(mut self) -> Result<Query> {
        let predicates = std::mem::take(&mut self.predicates);
        let checked = predicates
            .into_iter()
            .map(|p| self.check_predicate(p))
            .collect::<Result<Vec<_>>>()?;
        self.predicates = checked;
        for order in &self.order {
            self.column(&order.field)?;
        }
        Ok(self)
    }

    fn column(&self, field: &str) -> Result<FieldType> {
        self.schema
            .column_type(field)
            .ok_or_else(|| RecordError::UnknownField {
                entity: self.entity().to_string(),
                field: field.to_string(),
            })
    }

    fn cast(&self, field: &str, ty: &FieldType, value: Value) -> Result<Value> {
        ty.cast(value).map_err(|reason| RecordError::CastFailed {
            entity: self.entity().to_string(),
            field: field.to_string(),
            expected: ty.name(),
            reason,
        })
    }

    fn check_predicate(&self, predicate: Predicate) -> Result<Predicate> {
        Ok(match predicate {
            Predicate::Compare { field, op, value } => {
                let ty = self.column(&field)?;
                let value = self.cast(&field, &ty, value)?;
                Predicate::Compare { field, op, value }
            }
            Predicate::In {
                field,
                values,
                negated,
            } => {
                let ty = self.column(&field)?;
                let values = values
                    .into_iter()
                    .map(|v| self.cast(&field, &ty, v))
                    .collect::<Result<_>>()?;
                Predicate::In {
                    field,
                    values,
                    negated,
                }
            }
            Predicate::Null { field, negated } => {
                self.column(&field)?;
                Predicate::Null { field, negated }
            }
            Predicate::Like { field, pattern } => {
                match self.column(&field)? {
                    FieldType::Text | FieldType::Enum { .. } | FieldType::Json => {}
                    other => {
                        return Err(RecordError::CastFailed {
                            entity: self.entity().to_string(),
                            field,
                            expected: "string".to_string(),
                            reason: format!("LIKE is not supported on {} columns", other.name()),
                        })
                    }
                }
                Predicate::Like { field, pattern }
            }
            Predicate::JsonContains { field, value } => {
                let ty = self.column(&field)?;
                if ty != FieldType::Json {
                    return Err(RecordError::CastFailed {
                        entity: self.entity().to_string(),
                        field,
                        expected: "json".to_string(),
                        reason: "containment needs a json column".to_string(),
                    });
                }
                Predicate::JsonContains { field, value }
            }
            Predicate::Any(inner) => Predicate::Any(
                inner
                    .into_iter()
                    .map(|p| self.check_predicate(p))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}
