//! Provenance tracking for seed imports
//!
//! Records one row per import in the seed_imports table

#![allow(clippy::result_large_err)]

use rusqlite::Connection;

use crate::codec;
use crate::errors::{from_rusqlite, Result};

/// A recorded seed import
#[derive(Debug, Clone, PartialEq)]
pub struct SeedImport {
    pub seed_digest: String,
    pub source: Option<String>,
    pub record_count: i64,
    pub imported_at: chrono::DateTime<chrono::Utc>,
}

/// Record a completed import
pub fn record_import(
    conn: &Connection,
    seed_digest: &str,
    source: Option<&str>,
    record_count: usize,
) -> Result<()> {
    let now = codec::datetime_to_millis(chrono::Utc::now());
    conn.execute(
        "INSERT INTO seed_imports (seed_digest, source, record_count, imported_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![seed_digest, source, record_count as i64, now],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// All imports, oldest first
pub fn list_imports(conn: &Connection) -> Result<Vec<SeedImport>> {
    let mut stmt = conn
        .prepare("SELECT seed_digest, source, record_count, imported_at FROM seed_imports ORDER BY id")
        .map_err(from_rusqlite)?;

    let rows = stmt
        .query_map([], |row| {
            let imported_at: i64 = row.get(3)?;
            Ok(SeedImport {
                seed_digest: row.get(0)?,
                source: row.get(1)?,
                record_count: row.get(2)?,
                imported_at: codec::millis_to_datetime(imported_at).unwrap_or_default(),
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;
    use civitas_core::Registry;

    fn setup_test_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrations::apply_migrations(&mut conn, &Registry::new()).unwrap();
        conn
    }

    #[test]
    fn test_record_and_list_imports() {
        let conn = setup_test_db();

        record_import(&conn, "abc123", Some("fixtures/alumni.yaml"), 4).unwrap();
        record_import(&conn, "def456", None, 0).unwrap();

        let imports = list_imports(&conn).unwrap();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].seed_digest, "abc123");
        assert_eq!(imports[0].source.as_deref(), Some("fixtures/alumni.yaml"));
        assert_eq!(imports[0].record_count, 4);
        assert_eq!(imports[1].source, None);
    }
}
