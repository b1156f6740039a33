//! Schema inspection commands
//!
//! Usage:
//!   civitas migrate
//!   civitas entities [NAME]

use clap::Args;
use civitas_core::schema::{Relation, RelationKind};
use civitas_core::EntitySchema;
use civitas_store::migrations::applied_migrations;
use civitas_store::RecordStore;
use serde_json::{json, Value as JsonValue};

use super::print_json;

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    /// Describe this entity instead of listing all of them
    pub name: Option<String>,
}

/// Print the applied migrations
///
/// Opening the store already applied anything pending.
pub fn migrate(store: &RecordStore) -> civitas_store::Result<()> {
    let applied: Vec<JsonValue> = applied_migrations(store.connection())?
        .into_iter()
        .map(|m| {
            json!({
                "migration_id": m.migration_id,
                "applied_at": m.applied_at,
                "checksum": m.checksum,
            })
        })
        .collect();
    print_json(&JsonValue::Array(applied))
}

pub fn entities(store: &RecordStore, args: EntitiesArgs) -> civitas_store::Result<()> {
    let registry = store.registry();
    match args.name {
        Some(name) => print_json(&describe(registry.get(&name)?)),
        None => {
            let names: Vec<&str> = registry.entities().map(|s| s.name()).collect();
            print_json(&json!(names))
        }
    }
}

fn describe(schema: &EntitySchema) -> JsonValue {
    let fields: Vec<JsonValue> = schema
        .fields()
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "type": f.ty.name(),
                "nullable": f.nullable,
                "default": f.default.as_ref().map(|d| d.to_json()),
                "unique": f.unique,
                "hidden": f.hidden,
                "fillable": schema.is_fillable(&f.name),
            })
        })
        .collect();

    json!({
        "name": schema.name(),
        "timestamps": schema.timestamps(),
        "soft_deletes": schema.soft_deletes(),
        "fields": fields,
        "relations": schema.relations().iter().map(relation).collect::<Vec<_>>(),
        "scopes": schema.scope_names().collect::<Vec<_>>(),
        "appends": schema.appends().iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
    })
}

fn relation(relation: &Relation) -> JsonValue {
    let (kind, via) = match &relation.kind {
        RelationKind::BelongsTo { foreign_key } => ("belongs_to", foreign_key.as_str()),
        RelationKind::HasOne { foreign_key } => ("has_one", foreign_key.as_str()),
        RelationKind::HasMany { foreign_key, .. } => ("has_many", foreign_key.as_str()),
        RelationKind::BelongsToMany { pivot_table, .. } => {
            ("belongs_to_many", pivot_table.as_str())
        }
    };
    json!({
        "name": relation.name,
        "kind": kind,
        "target": relation.target,
        "via": via,
    })
}
