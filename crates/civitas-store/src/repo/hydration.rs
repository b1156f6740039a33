//! Hydration layer - turns SQLite rows back into typed records
//!
//! Rows are expected in `sql::select_columns` order: id, declared fields,
//! then whichever bookkeeping timestamps the entity has.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use civitas_core::schema::FieldDef;
use civitas_core::{Attributes, EntitySchema, Record, RecordId};
use rusqlite::{params_from_iter, Connection, Row};

use crate::codec;
use crate::errors::{from_rusqlite, Result};
use crate::sql::Statement;

/// Build a record from a row, reading columns starting at index 0
pub fn hydrate(schema: &EntitySchema, row: &Row<'_>) -> Result<Record> {
    let id: i64 = row.get(0).map_err(from_rusqlite)?;

    let mut attributes = Attributes::new();
    for (i, field) in schema.fields().iter().enumerate() {
        attributes.insert(field.name.clone(), decode_column(schema.name(), field, row, i + 1)?);
    }

    let timestamp = |index: usize| -> Result<Option<DateTime<Utc>>> {
        codec::decode_timestamp(row.get_ref(index).map_err(from_rusqlite)?)
    };

    let mut next = schema.fields().len() + 1;
    let (created_at, updated_at) = if schema.timestamps() {
        next += 2;
        (timestamp(next - 2)?, timestamp(next - 1)?)
    } else {
        (None, None)
    };
    let deleted_at = if schema.soft_deletes() {
        timestamp(next)?
    } else {
        None
    };

    Ok(Record {
        entity: schema.name().to_string(),
        id: RecordId(id),
        attributes,
        created_at,
        updated_at,
        deleted_at,
    })
}

/// Decode extra columns (pivot attributes) that follow the record's own
pub fn hydrate_extra(
    owner: &str,
    fields: &[FieldDef],
    row: &Row<'_>,
    offset: usize,
) -> Result<Attributes> {
    let mut out = Attributes::new();
    for (i, field) in fields.iter().enumerate() {
        out.insert(field.name.clone(), decode_column(owner, field, row, offset + i)?);
    }
    Ok(out)
}

fn decode_column(
    owner: &str,
    field: &FieldDef,
    row: &Row<'_>,
    index: usize,
) -> Result<civitas_core::Value> {
    let raw = row.get_ref(index).map_err(from_rusqlite)?;
    codec::decode(&field.ty, raw).map_err(|e| e.with_entity(owner).with_field(field.name.as_str()))
}

/// Run a rendered `SELECT` and hydrate every row
pub fn fetch_all(
    conn: &Connection,
    schema: &EntitySchema,
    stmt: &Statement,
) -> Result<Vec<Record>> {
    fetch_with(conn, stmt, |row| hydrate(schema, row))
}

/// Run a statement and map each row with `f`
pub fn fetch_with<T>(
    conn: &Connection,
    stmt: &Statement,
    mut f: impl FnMut(&Row<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut prepared = conn.prepare(&stmt.sql).map_err(from_rusqlite)?;
    let mut rows = prepared
        .query(params_from_iter(stmt.params.iter()))
        .map_err(from_rusqlite)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(from_rusqlite)? {
        out.push(f(row)?);
    }
    Ok(out)
}
