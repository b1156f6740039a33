use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{RecordError, Result};
use crate::query::Query;
use crate::schema::{EntitySchema, FieldType, PivotTable, RelationKind, SchemaBuilder};

/// The set of entity schemas an application works with
///
/// Entities are added one at a time with `define`; cross-entity references
/// (relation targets, counter-cache parents, shared pivot tables) are
/// checked by `validate` once everything is defined.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entities: BTreeMap<String, Arc<EntitySchema>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register one entity
    pub fn define(&mut self, builder: SchemaBuilder) -> Result<Arc<EntitySchema>> {
        let schema = Arc::new(builder.build()?);
        let name = schema.name().to_string();
        if self.entities.contains_key(&name) {
            return Err(RecordError::DuplicateEntity { entity: name });
        }
        self.entities.insert(name, schema.clone());
        Ok(schema)
    }

    pub fn get(&self, entity: &str) -> Result<&Arc<EntitySchema>> {
        self.entities
            .get(entity)
            .ok_or_else(|| RecordError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Schemas in name order
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Start a query against `entity`
    pub fn query(&self, entity: &str) -> Result<Query> {
        Ok(Query::new(self.get(entity)?.clone()))
    }

    /// Join tables across all entities, deduplicated by name
    pub fn pivot_tables(&self) -> Vec<PivotTable> {
        let mut tables: BTreeMap<String, PivotTable> = BTreeMap::new();
        for schema in self.entities.values() {
            for table in schema.pivot_tables() {
                tables.entry(table.name.clone()).or_insert(table);
            }
        }
        tables.into_values().collect()
    }

    /// Check every cross-entity reference
    pub fn validate(&self) -> Result<()> {
        for schema in self.entities.values() {
            self.validate_relations(schema)?;
            self.validate_hooks(schema)?;
        }
        self.validate_pivots()
    }

    fn validate_relations(&self, schema: &EntitySchema) -> Result<()> {
        let invalid = |reason: String| RecordError::InvalidReference {
            entity: schema.name().to_string(),
            reason,
        };

        for relation in schema.relations() {
            let target = self.entities.get(&relation.target).ok_or_else(|| {
                invalid(format!(
                    "relation '{}' targets undefined entity '{}'",
                    relation.name, relation.target
                ))
            })?;

            match &relation.kind {
                RelationKind::BelongsTo { .. } | RelationKind::BelongsToMany { .. } => {}
                RelationKind::HasOne { foreign_key }
                | RelationKind::HasMany { foreign_key, .. } => {
                    if target.column_type(foreign_key) != Some(FieldType::Integer) {
                        return Err(invalid(format!(
                            "relation '{}' needs integer field '{}.{}'",
                            relation.name, relation.target, foreign_key
                        )));
                    }
                    if let RelationKind::HasMany {
                        order: Some(order), ..
                    } = &relation.kind
                    {
                        if target.column_type(&order.field).is_none() {
                            return Err(invalid(format!(
                                "relation '{}' orders by unknown field '{}.{}'",
                                relation.name, relation.target, order.field
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_hooks(&self, schema: &EntitySchema) -> Result<()> {
        for (_, hook) in schema.hooks() {
            let Some((parent, foreign_key, counter)) = hook.counter_target() else {
                continue;
            };
            let invalid = |reason: String| RecordError::InvalidReference {
                entity: schema.name().to_string(),
                reason,
            };

            let parent_schema = self
                .entities
                .get(parent)
                .ok_or_else(|| invalid(format!("counter parent '{}' is not defined", parent)))?;
            if schema.column_type(foreign_key) != Some(FieldType::Integer) {
                return Err(invalid(format!(
                    "counter foreign key '{}' is not an integer field",
                    foreign_key
                )));
            }
            match parent_schema.field(counter) {
                Some(field) if field.ty == FieldType::Integer => {}
                _ => {
                    return Err(invalid(format!(
                        "counter field '{}.{}' is not an integer field",
                        parent, counter
                    )))
                }
            }
        }
        Ok(())
    }

    fn validate_pivots(&self) -> Result<()> {
        let mut seen: BTreeMap<String, PivotTable> = BTreeMap::new();
        for schema in self.entities.values() {
            for table in schema.pivot_tables() {
                if self.entities.contains_key(&table.name) {
                    return Err(RecordError::InvalidReference {
                        entity: schema.name().to_string(),
                        reason: format!("pivot table '{}' clashes with an entity", table.name),
                    });
                }
                match seen.get(&table.name) {
                    None => {
                        seen.insert(table.name.clone(), table);
                    }
                    Some(existing) if existing.keys == table.keys => {}
                    Some(_) => {
                        return Err(RecordError::InvalidReference {
                            entity: schema.name().to_string(),
                            reason: format!(
                                "pivot table '{}' is declared with different keys",
                                table.name
                            ),
                        })
                    }
                }
            }
        }
        Ok(())
    }
}
