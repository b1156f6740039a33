//! Record operations bound to one connection or transaction
//!
//! `RecordStore` hands a `UnitOfWork` over an open `BEGIN IMMEDIATE`
//! transaction to writes and to `RecordStore::transaction` callers; reads
//! use one over the bare connection. Hooks run through the same unit of
//! work, so their writes commit or roll back with the operation that
//! triggered them.

#![allow(clippy::result_large_err)]

use std::sync::Arc;

use chrono::Utc;
use civitas_core::errors::{ExError, ExErrorKind, RecordError};
use civitas_core::schema::{FieldType, RelationKind};
use civitas_core::{
    Attributes, EntitySchema, FillPolicy, HookContext, HookEvent, PivotRecord, Query, Record,
    RecordId, Registry, Trashed, WriteMode,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tracing::warn;

use crate::codec;
use crate::errors::{from_rusqlite, Result};
use crate::repo::hydration;
use crate::sql::{self, Statement};

/// Result of following a relation
#[derive(Debug, Clone)]
pub enum Related {
    /// belongs-to and has-one
    One(Option<Record>),
    /// has-many, as a query the caller can refine and run
    Many(Query),
    /// belongs-to-many, with join-row attributes
    Pivoted(Vec<PivotRecord>),
}

pub struct UnitOfWork<'c> {
    conn: &'c Connection,
    registry: &'c Registry,
    policy: FillPolicy,
}

impl<'c> UnitOfWork<'c> {
    pub(crate) fn new(conn: &'c Connection, registry: &'c Registry, policy: FillPolicy) -> Self {
        Self {
            conn,
            registry,
            policy,
        }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub(crate) fn connection(&self) -> &Connection {
        self.conn
    }

    pub fn query(&self, entity: &str) -> Result<Query> {
        Ok(self.registry.query(entity)?)
    }

    fn schema(&self, entity: &str) -> Result<Arc<EntitySchema>> {
        Ok(self.registry.get(entity)?.clone())
    }

    fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<usize> {
        self.conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)
    }

    // ===== Reads =====

    /// All rows matching `query`
    pub fn get(&self, query: Query) -> Result<Vec<Record>> {
        let query = query.checked()?;
        let stmt = sql::select(&query);
        hydration::fetch_all(self.conn, query.schema(), &stmt)
    }

    pub fn first(&self, query: Query) -> Result<Option<Record>> {
        Ok(self.get(query.limit(1))?.into_iter().next())
    }

    pub fn count(&self, query: Query) -> Result<u64> {
        let query = query.checked()?;
        let stmt = sql::count(&query);
        let n: i64 = self
            .conn
            .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))
            .map_err(from_rusqlite)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn fetch(&self, entity: &str, id: RecordId, trashed: Trashed) -> Result<Option<Record>> {
        let query = self.query(entity)?.where_eq("id", id);
        let query = match trashed {
            Trashed::Exclude => query,
            Trashed::Include => query.with_trashed(),
            Trashed::Only => query.only_trashed(),
        };
        self.first(query)
    }

    /// Live record by id; soft-deleted rows are invisible
    pub fn find(&self, entity: &str, id: RecordId) -> Result<Option<Record>> {
        self.fetch(entity, id, Trashed::Exclude)
    }

    pub fn find_with_trashed(&self, entity: &str, id: RecordId) -> Result<Option<Record>> {
        self.fetch(entity, id, Trashed::Include)
    }

    pub fn find_or_fail(&self, entity: &str, id: RecordId) -> Result<Record> {
        self.find(entity, id)?.ok_or_else(|| not_found(entity, id))
    }

    // ===== Writes =====

    /// Insert a record and run its `AfterCreate` hooks
    pub fn create(&mut self, entity: &str, input: Attributes) -> Result<Record> {
        let schema = self.schema(entity)?;
        let prepared = schema.prepare(input, self.policy, WriteMode::Create)?;
        if !prepared.discarded.is_empty() {
            warn!(entity, fields = ?prepared.discarded, "discarded fields outside the allow-list");
        }

        let mut columns: Vec<&str> = prepared.attributes.keys().map(String::as_str).collect();
        let mut params: Vec<SqlValue> = prepared.attributes.values().map(codec::encode).collect();
        if schema.timestamps() {
            let now = SqlValue::Integer(codec::datetime_to_millis(Utc::now()));
            columns.extend(["created_at", "updated_at"]);
            params.extend([now.clone(), now]);
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", entity)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                entity,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        self.execute(&sql, params)?;

        let id = RecordId(self.conn.last_insert_rowid());
        let record = self.reload(entity, id)?;
        self.run_hooks(&schema, HookEvent::AfterCreate, &record)?;
        Ok(record)
    }

    /// Partial update of a live record; refreshes `updated_at` and runs
    /// `AfterUpdate` hooks with the previous row
    pub fn update(&mut self, entity: &str, id: RecordId, input: Attributes) -> Result<Record> {
        let schema = self.schema(entity)?;
        let prepared = schema.prepare(input, self.policy, WriteMode::Update)?;
        if !prepared.discarded.is_empty() {
            warn!(
                entity,
                id = id.get(),
                fields = ?prepared.discarded,
                "discarded fields outside the allow-list"
            );
        }

        let before = self.find_or_fail(entity, id)?;

        let mut sets: Vec<String> = prepared
            .attributes
            .keys()
            .map(|name| format!("{} = ?", name))
            .collect();
        let mut params: Vec<SqlValue> = prepared.attributes.values().map(codec::encode).collect();
        if schema.timestamps() {
            sets.push("updated_at = ?".to_string());
            params.push(SqlValue::Integer(codec::datetime_to_millis(Utc::now())));
        }

        if !sets.is_empty() {
            params.push(SqlValue::Integer(id.get()));
            self.execute(
                &format!("UPDATE {} SET {} WHERE id = ?", entity, sets.join(", ")),
                params,
            )?;
        }
        let record = self.reload(entity, id)?;
        self.run_update_hooks(&schema, &before, &record)?;
        Ok(record)
    }

    /// Soft delete when the entity supports it, otherwise remove the row
    pub fn delete(&mut self, entity: &str, id: RecordId) -> Result<()> {
        let schema = self.schema(entity)?;
        let mut record = self.find_or_fail(entity, id)?;

        if schema.soft_deletes() {
            let now = Utc::now();
            self.execute(
                &format!("UPDATE {} SET deleted_at = ? WHERE id = ?", entity),
                vec![
                    SqlValue::Integer(codec::datetime_to_millis(now)),
                    SqlValue::Integer(id.get()),
                ],
            )?;
            record.deleted_at = Some(now);
        } else {
            self.execute(
                &format!("DELETE FROM {} WHERE id = ?", entity),
                vec![SqlValue::Integer(id.get())],
            )?;
        }

        self.run_hooks(&schema, HookEvent::AfterDelete, &record)
    }

    /// Permanently remove a row, trashed or not
    ///
    /// `AfterDelete` hooks only run for rows that were still live; a trashed
    /// row already had them run when it was soft deleted.
    pub fn force_delete(&mut self, entity: &str, id: RecordId) -> Result<()> {
        let schema = self.schema(entity)?;
        let record = self
            .find_with_trashed(entity, id)?
            .ok_or_else(|| not_found(entity, id))?;

        self.execute(
            &format!("DELETE FROM {} WHERE id = ?", entity),
            vec![SqlValue::Integer(id.get())],
        )?;

        if record.is_trashed() {
            return Ok(());
        }
        self.run_hooks(&schema, HookEvent::AfterDelete, &record)
    }

    /// Bring a soft-deleted record back and run its `AfterRestore` hooks
    pub fn restore(&mut self, entity: &str, id: RecordId) -> Result<Record> {
        let schema = self.schema(entity)?;
        let trashed = self
            .fetch(entity, id, Trashed::Only)?
            .ok_or_else(|| not_found(entity, id))?;
        debug_assert!(trashed.is_trashed());

        let mut sets = vec!["deleted_at = NULL"];
        let mut params = Vec::new();
        if schema.timestamps() {
            sets.push("updated_at = ?");
            params.push(SqlValue::Integer(codec::datetime_to_millis(Utc::now())));
        }
        params.push(SqlValue::Integer(id.get()));
        self.execute(
            &format!("UPDATE {} SET {} WHERE id = ?", entity, sets.join(", ")),
            params,
        )?;

        let record = self.reload(entity, id)?;
        self.run_hooks(&schema, HookEvent::AfterRestore, &record)?;
        Ok(record)
    }

    fn reload(&self, entity: &str, id: RecordId) -> Result<Record> {
        self.find_with_trashed(entity, id)?.ok_or_else(|| {
            ExError::new(ExErrorKind::Internal)
                .with_entity(entity)
                .with_record_id(id.get())
                .with_message("row vanished inside its own transaction")
        })
    }

    fn run_hooks(
        &mut self,
        schema: &EntitySchema,
        event: HookEvent,
        record: &Record,
    ) -> Result<()> {
        for hook in schema.hooks_for(event) {
            hook.run(&mut *self, record)
                .map_err(|source| hook_error(schema, event, hook.name(), record, source))?;
        }
        Ok(())
    }

    fn run_update_hooks(
        &mut self,
        schema: &EntitySchema,
        before: &Record,
        after: &Record,
    ) -> Result<()> {
        let event = HookEvent::AfterUpdate;
        for hook in schema.hooks_for(event) {
            hook.run_update(&mut *self, before, after)
                .map_err(|source| hook_error(schema, event, hook.name(), after, source))?;
        }
        Ok(())
    }

    // ===== Relations =====

    /// Follow a declared relation from `record`
    pub fn relate(&self, record: &Record, relation: &str) -> Result<Related> {
        let schema = self.schema(&record.entity)?;
        let rel = schema.relation(relation)?;

        match &rel.kind {
            RelationKind::BelongsTo { foreign_key } => match record.foreign_id(foreign_key) {
                Some(parent) => Ok(Related::One(self.find(&rel.target, parent)?)),
                None => Ok(Related::One(None)),
            },
            RelationKind::HasOne { foreign_key } => {
                let query = self.query(&rel.target)?.where_eq(foreign_key, record.id);
                Ok(Related::One(self.first(query)?))
            }
            RelationKind::HasMany { foreign_key, order } => {
                let mut query = self.query(&rel.target)?.where_eq(foreign_key, record.id);
                if let Some(order) = order {
                    query = query.order_by(&order.field, order.direction);
                }
                Ok(Related::Many(query))
            }
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                pivot_fields,
            } => {
                let target = self.schema(&rel.target)?;
                let mut columns: Vec<String> = sql::select_columns(&target)
                    .iter()
                    .map(|c| format!("t.{}", c))
                    .collect();
                columns.extend(pivot_fields.iter().map(|f| format!("p.{}", f.name)));

                let mut sql = format!(
                    "SELECT {} FROM {} t JOIN {} p ON p.{} = t.id WHERE p.{} = ?",
                    columns.join(", "),
                    target.name(),
                    pivot_table,
                    related_pivot_key,
                    foreign_pivot_key
                );
                if target.soft_deletes() {
                    sql.push_str(" AND t.deleted_at IS NULL");
                }
                sql.push_str(" ORDER BY t.id ASC");

                let stmt = Statement {
                    sql,
                    params: vec![SqlValue::Integer(record.id.get())],
                };
                let offset = sql::select_columns(&target).len();
                let owner = format!("{}.{}", schema.name(), rel.name);
                let rows = hydration::fetch_with(self.conn, &stmt, |row| {
                    Ok(PivotRecord {
                        record: hydration::hydrate(&target, row)?,
                        pivot: hydration::hydrate_extra(&owner, pivot_fields, row, offset)?,
                    })
                })?;
                Ok(Related::Pivoted(rows))
            }
        }
    }

    pub fn belongs_to(&self, record: &Record, relation: &str) -> Result<Option<Record>> {
        match self.relate_kind(record, relation, "belongs_to")? {
            Related::One(found) => Ok(found),
            _ => Err(wrong_kind(record, relation, "belongs_to")),
        }
    }

    pub fn has_one(&self, record: &Record, relation: &str) -> Result<Option<Record>> {
        match self.relate_kind(record, relation, "has_one")? {
            Related::One(found) => Ok(found),
            _ => Err(wrong_kind(record, relation, "has_one")),
        }
    }

    pub fn has_many(&self, record: &Record, relation: &str) -> Result<Query> {
        match self.relate_kind(record, relation, "has_many")? {
            Related::Many(query) => Ok(query),
            _ => Err(wrong_kind(record, relation, "has_many")),
        }
    }

    pub fn belongs_to_many(&self, record: &Record, relation: &str) -> Result<Vec<PivotRecord>> {
        match self.relate_kind(record, relation, "belongs_to_many")? {
            Related::Pivoted(rows) => Ok(rows),
            _ => Err(wrong_kind(record, relation, "belongs_to_many")),
        }
    }

    fn relate_kind(&self, record: &Record, relation: &str, expected: &str) -> Result<Related> {
        let schema = self.schema(&record.entity)?;
        let matches = matches!(
            (&schema.relation(relation)?.kind, expected),
            (RelationKind::BelongsTo { .. }, "belongs_to")
                | (RelationKind::HasOne { .. }, "has_one")
                | (RelationKind::HasMany { .. }, "has_many")
                | (RelationKind::BelongsToMany { .. }, "belongs_to_many")
        );
        if !matches {
            return Err(wrong_kind(record, relation, expected));
        }
        self.relate(record, relation)
    }

    // ===== Pivots =====

    /// Add a belongs-to-many association with optional pivot attributes
    pub fn attach(
        &mut self,
        record: &Record,
        relation: &str,
        related: RecordId,
        pivot: Attributes,
    ) -> Result<()> {
        let schema = self.schema(&record.entity)?;
        let pivot = schema.prepare_pivot(relation, pivot)?;
        let (table, fpk, rpk, target) = pivot_keys(&schema, relation)?;
        self.find_or_fail(&target, related)?;

        let mut columns = vec![fpk, rpk];
        let mut params = vec![
            SqlValue::Integer(record.id.get()),
            SqlValue::Integer(related.get()),
        ];
        for (name, value) in &pivot {
            columns.push(name.clone());
            params.push(codec::encode(value));
        }
        self.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            ),
            params,
        )?;
        Ok(())
    }

    /// Remove one association, or all of them when `related` is `None`
    ///
    /// Returns the number of join rows removed.
    pub fn detach(
        &mut self,
        record: &Record,
        relation: &str,
        related: Option<RecordId>,
    ) -> Result<usize> {
        let schema = self.schema(&record.entity)?;
        let (table, fpk, rpk, _) = pivot_keys(&schema, relation)?;

        match related {
            Some(related) => self.execute(
                &format!("DELETE FROM {} WHERE {} = ? AND {} = ?", table, fpk, rpk),
                vec![
                    SqlValue::Integer(record.id.get()),
                    SqlValue::Integer(related.get()),
                ],
            ),
            None => self.execute(
                &format!("DELETE FROM {} WHERE {} = ?", table, fpk),
                vec![SqlValue::Integer(record.id.get())],
            ),
        }
    }

    /// Change pivot attributes of an existing association
    pub fn update_pivot(
        &mut self,
        record: &Record,
        relation: &str,
        related: RecordId,
        pivot: Attributes,
    ) -> Result<()> {
        let schema = self.schema(&record.entity)?;
        let pivot = schema.prepare_pivot(relation, pivot)?;
        let (table, fpk, rpk, _) = pivot_keys(&schema, relation)?;
        if pivot.is_empty() {
            return Ok(());
        }

        let sets: Vec<String> = pivot.keys().map(|name| format!("{} = ?", name)).collect();
        let mut params: Vec<SqlValue> = pivot.values().map(codec::encode).collect();
        params.push(SqlValue::Integer(record.id.get()));
        params.push(SqlValue::Integer(related.get()));

        let changed = self.execute(
            &format!(
                "UPDATE {} SET {} WHERE {} = ? AND {} = ?",
                table,
                sets.join(", "),
                fpk,
                rpk
            ),
            params,
        )?;
        if changed == 0 {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_entity(table)
                .with_record_id(related.get())
                .with_message(format!(
                    "{}#{} is not attached to {}#{}",
                    record.entity, record.id, relation, related
                )));
        }
        Ok(())
    }
}

impl HookContext for UnitOfWork<'_> {
    fn adjust_counter(
        &mut self,
        entity: &str,
        id: RecordId,
        field: &str,
        delta: i64,
    ) -> std::result::Result<(), ExError> {
        let schema = self.schema(entity)?;
        if schema.column_type(field) != Some(FieldType::Integer) || field == "id" {
            return Err(RecordError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            }
            .into());
        }

        let changed = self.execute(
            &format!("UPDATE {} SET {f} = {f} + ? WHERE id = ?", entity, f = field),
            vec![SqlValue::Integer(delta), SqlValue::Integer(id.get())],
        )?;
        if changed == 0 {
            return Err(not_found(entity, id).with_field(field));
        }
        Ok(())
    }
}

fn hook_error(
    schema: &EntitySchema,
    event: HookEvent,
    hook: &str,
    record: &Record,
    source: ExError,
) -> ExError {
    ExError::new(ExErrorKind::Hook)
        .with_op(event.as_str())
        .with_entity(schema.name())
        .with_record_id(record.id.get())
        .with_message(format!("hook '{}' failed", hook))
        .with_source(source)
}

fn not_found(entity: &str, id: RecordId) -> ExError {
    RecordError::RecordNotFound {
        entity: entity.to_string(),
        id: id.get(),
    }
    .into()
}

fn wrong_kind(record: &Record, relation: &str, expected: &str) -> ExError {
    ExError::new(ExErrorKind::Schema)
        .with_entity(record.entity.as_str())
        .with_message(format!("relation '{}' is not {}", relation, expected))
}

/// `(pivot table, this side's key, related key, target entity)`
fn pivot_keys(schema: &EntitySchema, relation: &str) -> Result<(String, String, String, String)> {
    let rel = schema.relation(relation)?;
    match &rel.kind {
        RelationKind::BelongsToMany {
            pivot_table,
            foreign_pivot_key,
            related_pivot_key,
            ..
        } => Ok((
            pivot_table.clone(),
            foreign_pivot_key.clone(),
            related_pivot_key.clone(),
            rel.target.clone(),
        )),
        _ => Err(ExError::new(ExErrorKind::Schema)
            .with_entity(schema.name())
            .with_message(format!("relation '{}' is not belongs_to_many", relation))),
    }
}
