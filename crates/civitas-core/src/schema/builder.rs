use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::errors::{RecordError, Result};
use crate::hooks::{CounterHook, HookEvent, LifecycleHook};
use crate::query::{OrderBy, Query, ScopeArgs, ScopeFn};
use crate::record::ComputedFn;
use crate::schema::field::{FieldDef, FieldType};
use crate::schema::relation::{Relation, RelationKind};
use crate::schema::{check_identifier, EntitySchema, RESERVED_COLUMNS};
use crate::value::Value;

enum Decl {
    Raw(String),
    Typed(FieldType),
}

struct PendingField {
    name: String,
    decl: Decl,
    nullable: bool,
    default: Option<Value>,
    counter: bool,
}

enum PendingRelation {
    Plain(Relation),
    Pivot {
        name: String,
        target: String,
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        pivot_fields: Vec<(String, String)>,
    },
}

/// Fluent declaration of an `EntitySchema`
///
/// Builder methods never fail; everything is checked in `build()`, which
/// reports the first problem found.
///
/// ```
/// use civitas_core::schema::SchemaBuilder;
///
/// let schema = SchemaBuilder::new("forum_categories")
///     .required("name", "string")
///     .field("description", "text")
///     .counter("threads_count")
///     .has_many("threads", "forum_threads", "category_id")
///     .build()
///     .unwrap();
///
/// assert!(schema.is_fillable("name"));
/// assert!(!schema.is_fillable("threads_count"));
/// ```
pub struct SchemaBuilder {
    name: String,
    fields: Vec<PendingField>,
    unique: Vec<String>,
    hidden: Vec<String>,
    fillable: Option<Vec<String>>,
    timestamps: bool,
    soft_deletes: bool,
    relations: Vec<PendingRelation>,
    scopes: Vec<(String, ScopeFn)>,
    hooks: Vec<(HookEvent, Arc<dyn LifecycleHook>)>,
    appends: Vec<(String, ComputedFn)>,
    unique_together: Vec<Vec<String>>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            unique: Vec::new(),
            hidden: Vec::new(),
            fillable: None,
            timestamps: true,
            soft_deletes: false,
            relations: Vec::new(),
            scopes: Vec::new(),
            hooks: Vec::new(),
            appends: Vec::new(),
            unique_together: Vec::new(),
        }
    }

    fn push_field(
        mut self,
        name: &str,
        decl: Decl,
        nullable: bool,
        default: Option<Value>,
    ) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            decl,
            nullable,
            default,
            counter: false,
        });
        self
    }

    /// Nullable field declared by cast name (`"string"`, `"decimal:2"`, `"enum:a,b"`)
    pub fn field(self, name: &str, decl: &str) -> Self {
        self.push_field(name, Decl::Raw(decl.to_string()), true, None)
    }

    /// Nullable field with an already-built type
    pub fn typed(self, name: &str, ty: FieldType) -> Self {
        self.push_field(name, Decl::Typed(ty), true, None)
    }

    /// Non-nullable field with no default; creates must supply it
    pub fn required(self, name: &str, decl: &str) -> Self {
        self.push_field(name, Decl::Raw(decl.to_string()), false, None)
    }

    /// Non-nullable field that falls back to `default` on create
    pub fn with_default(self, name: &str, decl: &str, default: impl Into<Value>) -> Self {
        self.push_field(name, Decl::Raw(decl.to_string()), false, Some(default.into()))
    }

    /// Integer counter maintained by hooks, starting at zero
    pub fn counter(mut self, name: &str) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            decl: Decl::Typed(FieldType::Integer),
            nullable: false,
            default: Some(Value::Integer(0)),
            counter: true,
        });
        self
    }

    pub fn unique(mut self, field: &str) -> Self {
        self.unique.push(field.to_string());
        self
    }

    pub fn unique_together(mut self, fields: &[&str]) -> Self {
        self.unique_together
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Omit a field from serialized output
    pub fn hidden(mut self, field: &str) -> Self {
        self.hidden.push(field.to_string());
        self
    }

    /// Explicit mass-assignment allow-list
    ///
    /// Without one, every declared field except counters is fillable.
    pub fn fillable(mut self, fields: &[&str]) -> Self {
        self.fillable = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self
    }

    fn relation(mut self, name: &str, target: &str, kind: RelationKind) -> Self {
        self.relations.push(PendingRelation::Plain(Relation {
            name: name.to_string(),
            target: target.to_string(),
            kind,
        }));
        self
    }

    pub fn belongs_to(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relation(
            name,
            target,
            RelationKind::BelongsTo {
                foreign_key: foreign_key.to_string(),
            },
        )
    }

    pub fn has_one(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relation(
            name,
            target,
            RelationKind::HasOne {
                foreign_key: foreign_key.to_string(),
            },
        )
    }

    pub fn has_many(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relation(
            name,
            target,
            RelationKind::HasMany {
                foreign_key: foreign_key.to_string(),
                order: None,
            },
        )
    }

    /// Has-many whose related query carries a default ordering
    pub fn has_many_ordered(
        self,
        name: &str,
        target: &str,
        foreign_key: &str,
        order: OrderBy,
    ) -> Self {
        self.relation(
            name,
            target,
            RelationKind::HasMany {
                foreign_key: foreign_key.to_string(),
                order: Some(order),
            },
        )
    }

    /// Many-to-many through `pivot_table`
    ///
    /// `pivot_fields` are `(name, cast)` pairs for extra join-table columns.
    pub fn belongs_to_many(
        mut self,
        name: &str,
        target: &str,
        pivot_table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
        pivot_fields: &[(&str, &str)],
    ) -> Self {
        self.relations.push(PendingRelation::Pivot {
            name: name.to_string(),
            target: target.to_string(),
            pivot_table: pivot_table.to_string(),
            foreign_pivot_key: foreign_pivot_key.to_string(),
            related_pivot_key: related_pivot_key.to_string(),
            pivot_fields: pivot_fields
                .iter()
                .map(|(n, d)| (n.to_string(), d.to_string()))
                .collect(),
        });
        self
    }

    /// Register a named, reusable query restriction
    pub fn scope<F>(mut self, name: &str, scope: F) -> Self
    where
        F: Fn(Query, &ScopeArgs) -> Result<Query> + Send + Sync + 'static,
    {
        self.scopes.push((name.to_string(), Arc::new(scope)));
        self
    }

    pub fn hook(mut self, event: HookEvent, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push((event, hook));
        self
    }

    /// Keep `parent.counter` in step with the number of live rows of this entity
    ///
    /// Registers +1 after create, -1 after delete and +1 after restore. An
    /// update that changes `foreign_key` moves the count to the new parent.
    pub fn counter_cache(self, parent: &str, foreign_key: &str, counter: &str) -> Self {
        let make = |delta| Arc::new(CounterHook::new(parent, foreign_key, counter, delta));
        self.hook(HookEvent::AfterCreate, make(1))
            .hook(HookEvent::AfterDelete, make(-1))
            .hook(HookEvent::AfterRestore, make(1))
            .hook(HookEvent::AfterUpdate, make(1))
    }

    /// Read-only attribute derived from the record, included in serialized output
    pub fn append(mut self, name: &str, compute: ComputedFn) -> Self {
        self.appends.push((name.to_string(), compute));
        self
    }

    pub fn build(self) -> Result<EntitySchema> {
        let entity = self.name.clone();
        check_identifier(&entity)?;

        let mut fields: Vec<FieldDef> = Vec::with_capacity(self.fields.len());
        for pending in self.fields {
            let field = resolve_field(&entity, pending)?;
            if fields.iter().any(|f| f.name == field.name) {
                return Err(RecordError::DuplicateField {
                    entity,
                    field: field.name,
                });
            }
            fields.push(field);
        }

        for name in &self.unique {
            field_mut(&entity, &mut fields, name)?.unique = true;
        }
        for name in &self.hidden {
            field_mut(&entity, &mut fields, name)?.hidden = true;
        }

        let fillable: BTreeSet<String> = match self.fillable {
            Some(list) => {
                for name in &list {
                    let field = fields.iter().find(|f| f.name == *name).ok_or_else(|| {
                        RecordError::InvalidReference {
                            entity: entity.clone(),
                            reason: format!("fillable field '{}' is not declared", name),
                        }
                    })?;
                    if field.counter {
                        return Err(RecordError::InvalidReference {
                            entity: entity.clone(),
                            reason: format!("counter field '{}' cannot be fillable", name),
                        });
                    }
                }
                list.into_iter().collect()
            }
            None => fields
                .iter()
                .filter(|f| !f.counter)
                .map(|f| f.name.clone())
                .collect(),
        };

        for group in &self.unique_together {
            if group.len() < 2 {
                return Err(RecordError::InvalidReference {
                    entity: entity.clone(),
                    reason: "unique_together needs at least two fields".to_string(),
                });
            }
            for name in group {
                if !fields.iter().any(|f| f.name == *name) {
                    return Err(RecordError::InvalidReference {
                        entity: entity.clone(),
                        reason: format!("unique_together field '{}' is not declared", name),
                    });
                }
            }
        }

        let mut relations: Vec<Relation> = Vec::with_capacity(self.relations.len());
        for pending in self.relations {
            let relation = resolve_relation(&entity, pending)?;
            check_identifier(&relation.name)?;
            check_identifier(&relation.target)?;
            if relations.iter().any(|r| r.name == relation.name)
                || fields.iter().any(|f| f.name == relation.name)
            {
                return Err(RecordError::DuplicateRelation {
                    entity: entity.clone(),
                    relation: relation.name,
                });
            }
            if let RelationKind::BelongsTo { foreign_key } = &relation.kind {
                let fk = fields.iter().find(|f| f.name == *foreign_key);
                if !matches!(fk, Some(f) if f.ty == FieldType::Integer) {
                    return Err(RecordError::InvalidReference {
                        entity: entity.clone(),
                        reason: format!(
                            "relation '{}' needs an integer field '{}'",
                            relation.name, foreign_key
                        ),
                    });
                }
            }
            relations.push(relation);
        }

        let mut scopes = BTreeMap::new();
        for (name, scope) in self.scopes {
            check_identifier(&name)?;
            if scopes.insert(name.clone(), scope).is_some() {
                return Err(RecordError::InvalidReference {
                    entity: entity.clone(),
                    reason: format!("scope '{}' is declared more than once", name),
                });
            }
        }

        for (name, _) in &self.appends {
            check_identifier(name)?;
            if fields.iter().any(|f| f.name == *name) || RESERVED_COLUMNS.contains(&name.as_str())
            {
                return Err(RecordError::DuplicateField {
                    entity: entity.clone(),
                    field: name.clone(),
                });
            }
        }

        Ok(EntitySchema {
            name: entity,
            fields,
            fillable,
            timestamps: self.timestamps,
            soft_deletes: self.soft_deletes,
            relations,
            scopes,
            hooks: self.hooks,
            appends: self.appends,
            unique_together: self.unique_together,
        })
    }
}

fn resolve_field(entity: &str, pending: PendingField) -> Result<FieldDef> {
    check_identifier(&pending.name)?;
    if RESERVED_COLUMNS.contains(&pending.name.as_str()) {
        return Err(RecordError::ReservedField {
            entity: entity.to_string(),
            field: pending.name,
        });
    }

    let ty = match pending.decl {
        Decl::Typed(ty) => ty,
        Decl::Raw(decl) => {
            FieldType::parse(&decl).ok_or_else(|| RecordError::UnknownFieldType {
                entity: entity.to_string(),
                field: pending.name.clone(),
                type_name: decl.clone(),
            })?
        }
    };

    let default = match pending.default {
        Some(value) => Some(ty.cast(value).map_err(|reason| RecordError::CastFailed {
            entity: entity.to_string(),
            field: pending.name.clone(),
            expected: ty.name(),
            reason,
        })?),
        None => None,
    };

    Ok(FieldDef {
        ty,
        nullable: pending.nullable,
        default,
        counter: pending.counter,
        ..FieldDef::new(pending.name, FieldType::Text)
    })
}

fn field_mut<'a>(
    entity: &str,
    fields: &'a mut [FieldDef],
    name: &str,
) -> Result<&'a mut FieldDef> {
    fields
        .iter_mut()
        .find(|f| f.name == name)
        .ok_or_else(|| RecordError::InvalidReference {
            entity: entity.to_string(),
            reason: format!("field '{}' is not declared", name),
        })
}

fn resolve_relation(entity: &str, pending: PendingRelation) -> Result<Relation> {
    match pending {
        PendingRelation::Plain(relation) => {
            let key = match &relation.kind {
                RelationKind::BelongsTo { foreign_key }
                | RelationKind::HasOne { foreign_key }
                | RelationKind::HasMany { foreign_key, .. } => foreign_key,
                RelationKind::BelongsToMany { .. } => return Ok(relation),
            };
            check_identifier(key)?;
            Ok(relation)
        }
        PendingRelation::Pivot {
            name,
            target,
            pivot_table,
            foreign_pivot_key,
            related_pivot_key,
            pivot_fields,
        } => {
            check_identifier(&pivot_table)?;
            check_identifier(&foreign_pivot_key)?;
            check_identifier(&related_pivot_key)?;
            if foreign_pivot_key == related_pivot_key {
                return Err(RecordError::InvalidReference {
                    entity: entity.to_string(),
                    reason: format!("relation '{}' uses the same pivot key twice", name),
                });
            }

            let owner = format!("{}.{}", entity, name);
            let mut fields = Vec::with_capacity(pivot_fields.len());
            for (field_name, decl) in pivot_fields {
                if field_name == foreign_pivot_key
                    || field_name == related_pivot_key
                    || fields.iter().any(|f: &FieldDef| f.name == field_name)
                {
                    return Err(RecordError::DuplicateField {
                        entity: owner,
                        field: field_name,
                    });
                }
                fields.push(resolve_field(
                    &owner,
                    PendingField {
                        name: field_name,
                        decl: Decl::Raw(decl),
                        nullable: true,
                        default: None,
                        counter: false,
                    },
                )?);
            }

            Ok(Relation {
                name,
                target,
                kind: RelationKind::BelongsToMany {
                    pivot_table,
                    foreign_pivot_key,
                    related_pivot_key,
                    pivot_fields: fields,
                },
            })
        }
    }
}
