//! DDL generated from entity schemas
//!
//! Every entity gets an `id INTEGER PRIMARY KEY AUTOINCREMENT` table, its
//! declared columns, and the bookkeeping timestamps it opted into. Pivot
//! tables get a composite primary key over their two reference columns.

use std::collections::BTreeMap;

use civitas_core::schema::{FieldDef, PivotTable, RelationKind};
use civitas_core::{EntitySchema, FieldType, Registry};

use crate::codec;

/// One generated migration
#[derive(Debug, Clone, PartialEq)]
pub struct TableMigration {
    pub id: String,
    pub sql: String,
}

/// Storage class for a declared type
pub fn column_type(ty: &FieldType) -> &'static str {
    match ty {
        FieldType::Integer | FieldType::Boolean | FieldType::DateTime => "INTEGER",
        FieldType::Decimal { .. } => "REAL",
        FieldType::Text | FieldType::Enum { .. } | FieldType::Date | FieldType::Json => "TEXT",
    }
}

/// Entity tables first (by name), then pivot tables (by name)
pub fn table_migrations(registry: &Registry) -> Vec<TableMigration> {
    let mut out: Vec<TableMigration> = registry
        .entities()
        .map(|schema| TableMigration {
            id: format!("create_{}", schema.name()),
            sql: entity_table(schema),
        })
        .collect();

    let mut pivots = registry.pivot_tables();
    pivots.sort_by(|a, b| a.name.cmp(&b.name));
    out.extend(pivots.iter().map(|pivot| TableMigration {
        id: format!("create_{}", pivot.name),
        sql: pivot_table(pivot),
    }));
    out
}

fn column_def(field: &FieldDef, references: Option<&str>) -> String {
    let mut def = format!("{} {}", field.name, column_type(&field.ty));
    if !field.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &field.default {
        def.push_str(" DEFAULT ");
        def.push_str(&codec::literal(default));
    }
    if field.unique {
        def.push_str(" UNIQUE");
    }
    if let Some(target) = references {
        def.push_str(&format!(" REFERENCES {}(id)", target));
    }
    def
}

pub fn entity_table(schema: &EntitySchema) -> String {
    let foreign_keys: BTreeMap<&str, &str> = schema
        .relations()
        .iter()
        .filter_map(|r| match &r.kind {
            RelationKind::BelongsTo { foreign_key } => {
                Some((foreign_key.as_str(), r.target.as_str()))
            }
            _ => None,
        })
        .collect();

    let mut columns = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for field in schema.fields() {
        columns.push(column_def(
            field,
            foreign_keys.get(field.name.as_str()).copied(),
        ));
    }
    if schema.timestamps() {
        columns.push("created_at INTEGER".to_string());
        columns.push("updated_at INTEGER".to_string());
    }
    if schema.soft_deletes() {
        columns.push("deleted_at INTEGER".to_string());
    }

    let table = schema.name();
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        table,
        columns.join(",\n    ")
    );

    for fk in foreign_keys.keys() {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{t}_{c} ON {t}({c});\n",
            t = table,
            c = fk
        ));
    }
    if schema.soft_deletes() {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{t}_deleted_at ON {t}(deleted_at);\n",
            t = table
        ));
    }
    for group in schema.unique_together() {
        sql.push_str(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_{t}_{name} ON {t}({cols});\n",
            t = table,
            name = group.join("_"),
            cols = group.join(", ")
        ));
    }
    sql
}

pub fn pivot_table(pivot: &PivotTable) -> String {
    let mut columns: Vec<String> = pivot
        .keys
        .iter()
        .map(|(column, target)| {
            format!(
                "{} INTEGER NOT NULL REFERENCES {}(id) ON DELETE CASCADE",
                column, target
            )
        })
        .collect();
    columns.extend(pivot.fields.iter().map(|f| column_def(f, None)));
    columns.push(format!(
        "PRIMARY KEY ({}, {})",
        pivot.keys[0].0, pivot.keys[1].0
    ));

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        pivot.name,
        columns.join(",\n    ")
    );
    sql.push_str(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{t}_{c} ON {t}({c});\n",
        t = pivot.name,
        c = pivot.keys[1].0
    ));
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::SchemaBuilder;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .define(
                SchemaBuilder::new("users")
                    .required("email", "string")
                    .unique("email")
                    .counter("posts_count")
                    .belongs_to_many(
                        "groups",
                        "groups",
                        "group_members",
                        "user_id",
                        "group_id",
                        &[("role", "string")],
                    ),
            )
            .unwrap();
        registry
            .define(
                SchemaBuilder::new("groups")
                    .required("name", "string")
                    .soft_deletes()
                    .field("owner_id", "integer")
                    .belongs_to("owner", "users", "owner_id"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_entity_table_columns() {
        let registry = registry();
        let sql = entity_table(registry.get("users").unwrap());
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("email TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("posts_count INTEGER NOT NULL DEFAULT 0"));
        assert!(sql.contains("created_at INTEGER"));
        assert!(!sql.contains("deleted_at"));
    }

    #[test]
    fn test_foreign_key_references_target() {
        let registry = registry();
        let sql = entity_table(registry.get("groups").unwrap());
        assert!(sql.contains("owner_id INTEGER REFERENCES users(id)"));
        assert!(sql.contains("idx_groups_owner_id"));
        assert!(sql.contains("deleted_at INTEGER"));
    }

    #[test]
    fn test_migration_order_entities_then_pivots() {
        let ids: Vec<String> = table_migrations(&registry())
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["create_groups", "create_users", "create_group_members"]);
    }

    #[test]
    fn test_pivot_table_composite_key() {
        let registry = registry();
        let pivots = registry.pivot_tables();
        let sql = pivot_table(&pivots[0]);
        assert!(sql.contains("PRIMARY KEY (group_id, user_id)"));
        assert!(sql.contains("role TEXT"));
    }

    #[test]
    fn test_generated_ddl_executes() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for migration in table_migrations(&registry()) {
            conn.execute_batch(&migration.sql).unwrap();
        }
    }
}
