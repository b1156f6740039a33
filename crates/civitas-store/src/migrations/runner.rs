//! Migration runner
//!
//! Applies migrations with checksums and idempotency. Embedded migrations
//! run first, then the generated `create_<table>` migrations.

#![allow(clippy::result_large_err)]

use std::time::Instant;

use civitas_core::{log_op_end, log_op_error, log_op_start, Registry};
use rusqlite::{Connection, OptionalExtension};

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::ddl::table_migrations;
use crate::migrations::embedded::get_migrations;

/// A row of the `schema_version` table
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    pub migration_id: String,
    pub applied_at: i64,
    pub checksum: String,
}

/// Apply all pending migrations to the database
///
/// Running this twice is a no-op. A migration that was applied before but
/// whose SQL has since changed fails with a checksum mismatch and nothing
/// after it is applied.
pub fn apply_migrations(conn: &mut Connection, registry: &Registry) -> Result<()> {
    let start = Instant::now();
    log_op_start!("apply_migrations", entities = registry.len());

    let result = run_all(conn, registry);
    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(applied) => log_op_end!(
            "apply_migrations",
            duration_ms = duration_ms,
            applied = *applied
        ),
        Err(err) => log_op_error!("apply_migrations", err, duration_ms = duration_ms),
    }
    result.map(|_| ())
}

fn run_all(conn: &mut Connection, registry: &Registry) -> Result<usize> {
    create_schema_version_table(conn)?;

    let mut applied = 0;
    for migration in get_migrations() {
        if apply_migration(conn, migration.id, migration.sql)? {
            applied += 1;
        }
    }
    for migration in table_migrations(registry) {
        if apply_migration(conn, &migration.id, &migration.sql)? {
            applied += 1;
        }
    }
    Ok(applied)
}

/// List applied migrations in application order
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let mut stmt = conn
        .prepare("SELECT migration_id, applied_at, checksum FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                migration_id: row.get(0)?,
                applied_at: row.get(1)?,
                checksum: row.get(2)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// Create the schema_version table if it doesn't exist
fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// Apply a single migration if not already applied
///
/// Returns whether the migration ran.
fn apply_migration(conn: &mut Connection, migration_id: &str, sql: &str) -> Result<bool> {
    let checksum = compute_checksum(sql);

    let recorded: Option<String> = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?",
            [migration_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;

    if let Some(recorded) = recorded {
        if recorded != checksum {
            return Err(checksum_mismatch(migration_id, &recorded, &checksum));
        }
        return Ok(false);
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;

    tx.execute_batch(sql)
        .map_err(|e| migration_error(migration_id, &e.to_string()))?;

    let now = chrono::Utc::now().timestamp_millis();
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?, ?, ?)",
        rusqlite::params![migration_id, now, checksum],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;
    tracing::debug!(migration_id, "migration applied");

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::errors::ExErrorKind;
    use civitas_core::SchemaBuilder;

    fn registry(with_bio: bool) -> Registry {
        let mut builder = SchemaBuilder::new("members").required("name", "string");
        if with_bio {
            builder = builder.field("bio", "string");
        }
        let mut registry = Registry::new();
        registry.define(builder).unwrap();
        registry
    }

    #[test]
    fn test_apply_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn, &registry(false)).unwrap();

        let ids: Vec<String> = applied_migrations(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.migration_id)
            .collect();
        assert_eq!(ids, vec!["001_seed_provenance", "create_members"]);
    }

    #[test]
    fn test_idempotency() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn, &registry(false)).unwrap();
        apply_migrations(&mut conn, &registry(false)).unwrap();
        assert_eq!(applied_migrations(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_changed_schema_is_checksum_mismatch() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn, &registry(false)).unwrap();

        let err = apply_migrations(&mut conn, &registry(true)).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Schema);
        assert_eq!(err.op(), Some("migration_checksum"));
    }
}
