//! Entity schemas
//!
//! An `EntitySchema` is the single, explicit declaration of everything the
//! store needs to know about one entity type: its columns and casts, which of
//! them callers may mass-assign, its relationships, named query scopes,
//! lifecycle hooks and computed attributes. Schemas are built with
//! `SchemaBuilder` and validated once, at definition time.

pub mod builder;
pub mod field;
pub mod relation;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;

use crate::errors::{RecordError, Result};
use crate::hooks::{HookEvent, LifecycleHook};
use crate::query::ScopeFn;
use crate::record::{Attributes, ComputedFn};
use crate::value::Value;

pub use builder::SchemaBuilder;
pub use field::{FieldDef, FieldType};
pub use relation::{PivotTable, Relation, RelationKind};

/// Columns the store manages itself
pub const RESERVED_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// What to do with a write that names a field outside the allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillPolicy {
    /// Drop the field and carry on (logged by the store)
    #[default]
    Discard,
    /// Fail the whole write with a validation error
    Reject,
}

/// Whether a write creates a row or patches an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Attributes that passed the allow-list and their casts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreparedWrite {
    pub attributes: Attributes,
    /// Field names dropped under `FillPolicy::Discard`
    pub discarded: Vec<String>,
}

/// Validated declaration of one entity type
pub struct EntitySchema {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) fillable: BTreeSet<String>,
    pub(crate) timestamps: bool,
    pub(crate) soft_deletes: bool,
    pub(crate) relations: Vec<Relation>,
    pub(crate) scopes: BTreeMap<String, ScopeFn>,
    pub(crate) hooks: Vec<(HookEvent, Arc<dyn LifecycleHook>)>,
    pub(crate) appends: Vec<(String, ComputedFn)>,
    pub(crate) unique_together: Vec<Vec<String>>,
}

impl std::fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("fillable", &self.fillable)
            .field("timestamps", &self.timestamps)
            .field("soft_deletes", &self.soft_deletes)
            .field("relations", &self.relations)
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl EntitySchema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn is_fillable(&self, field: &str) -> bool {
        self.fillable.contains(field)
    }

    pub fn fillable(&self) -> impl Iterator<Item = &str> {
        self.fillable.iter().map(String::as_str)
    }

    pub fn hidden_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.hidden)
            .map(|f| f.name.as_str())
    }

    /// Type of any queryable column, including the store-managed ones
    pub fn column_type(&self, column: &str) -> Option<FieldType> {
        match column {
            "id" => Some(FieldType::Integer),
            "created_at" | "updated_at" if self.timestamps => Some(FieldType::DateTime),
            "deleted_at" if self.soft_deletes => Some(FieldType::DateTime),
            _ => self.field(column).map(|f| f.ty.clone()),
        }
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Result<&Relation> {
        self.relations
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RecordError::UnknownRelation {
                entity: self.name.clone(),
                relation: name.to_string(),
            })
    }

    pub fn scope(&self, name: &str) -> Result<&ScopeFn> {
        self.scopes
            .get(name)
            .ok_or_else(|| RecordError::UnknownScope {
                entity: self.name.clone(),
                scope: name.to_string(),
            })
    }

    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// Hooks registered for `event`, in registration order
    pub fn hooks_for(&self, event: HookEvent) -> impl Iterator<Item = &Arc<dyn LifecycleHook>> {
        self.hooks
            .iter()
            .filter(move |(e, _)| *e == event)
            .map(|(_, h)| h)
    }

    pub fn hooks(&self) -> &[(HookEvent, Arc<dyn LifecycleHook>)] {
        &self.hooks
    }

    pub fn appends(&self) -> &[(String, ComputedFn)] {
        &self.appends
    }

    pub fn unique_together(&self) -> &[Vec<String>] {
        &self.unique_together
    }

    /// Gate and cast a caller-supplied field map
    ///
    /// Fields that are undeclared or outside the allow-list are dropped or
    /// rejected according to `policy`. Every kept value goes through its
    /// field's cast. On create, defaults are filled in and required fields
    /// must be present.
    pub fn prepare(
        &self,
        input: Attributes,
        policy: FillPolicy,
        mode: WriteMode,
    ) -> Result<PreparedWrite> {
        let mut prepared = PreparedWrite::default();

        for (name, value) in input {
            let Some(field) = self.field(&name) else {
                match policy {
                    FillPolicy::Discard => {
                        prepared.discarded.push(name);
                        continue;
                    }
                    FillPolicy::Reject => {
                        return Err(RecordError::UnknownField {
                            entity: self.name.clone(),
                            field: name,
                        })
                    }
                }
            };

            if !self.is_fillable(&name) {
                match policy {
                    FillPolicy::Discard => {
                        prepared.discarded.push(name);
                        continue;
                    }
                    FillPolicy::Reject => {
                        return Err(RecordError::NotFillable {
                            entity: self.name.clone(),
                            field: name,
                        })
                    }
                }
            }

            let cast = self.cast_field(field, value)?;
            prepared.attributes.insert(name, cast);
        }

        if mode == WriteMode::Create {
            for field in &self.fields {
                if prepared.attributes.contains_key(&field.name) {
                    continue;
                }
                if let Some(default) = &field.default {
                    prepared
                        .attributes
                        .insert(field.name.clone(), default.clone());
                } else if field.is_required() {
                    return Err(RecordError::MissingRequired {
                        entity: self.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        Ok(prepared)
    }

    fn cast_field(&self, field: &FieldDef, value: Value) -> Result<Value> {
        let cast = field
            .ty
            .cast(value)
            .map_err(|reason| RecordError::CastFailed {
                entity: self.name.clone(),
                field: field.name.clone(),
                expected: field.ty.name(),
                reason,
            })?;

        if cast.is_null() && !field.nullable {
            return Err(RecordError::MissingRequired {
                entity: self.name.clone(),
                field: field.name.clone(),
            });
        }
        Ok(cast)
    }

    /// Cast the pivot attributes of a belongs-to-many attach/update
    ///
    /// Pivot writes are always strict: an undeclared pivot column is an error.
    pub fn prepare_pivot(&self, relation: &str, input: Attributes) -> Result<Attributes> {
        let relation = self.relation(relation)?;
        let mut out = Attributes::new();
        for (name, value) in input {
            let field = relation
                .pivot_field(&name)
                .ok_or_else(|| RecordError::UnknownField {
                    entity: format!("{}.{}", self.name, relation.name),
                    field: name.clone(),
                })?;
            out.insert(name, self.cast_field(field, value)?);
        }
        Ok(out)
    }

    /// Join tables this entity's belongs-to-many relations use
    pub fn pivot_tables(&self) -> Vec<PivotTable> {
        self.relations
            .iter()
            .filter_map(|r| match &r.kind {
                RelationKind::BelongsToMany {
                    pivot_table,
                    foreign_pivot_key,
                    related_pivot_key,
                    pivot_fields,
                } => {
                    let mut keys = [
                        (foreign_pivot_key.clone(), self.name.clone()),
                        (related_pivot_key.clone(), r.target.clone()),
                    ];
                    keys.sort();
                    Some(PivotTable {
                        name: pivot_table.clone(),
                        keys,
                        fields: pivot_fields.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }
}

/// Lowercase ASCII identifier usable as a table or column name
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(RecordError::InvalidIdentifier {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() || name.len() > 64 {
        return invalid("must be 1 to 64 characters");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return invalid("must not start with a digit");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return invalid("only lowercase letters, digits and underscores are allowed");
    }
    Ok(())
}
