//! The record store
//!
//! `RecordStore` owns one SQLite connection and the entity registry. Each
//! public operation is its own unit of work, bracketed by start/end log
//! events; `transaction` groups several operations into one.

#![allow(clippy::result_large_err)]

use std::sync::Arc;
use std::time::Instant;

use civitas_core::civitas_core_types::RequestContext;
use civitas_core::errors::ExError;
use civitas_core::{
    log_op_end, log_op_error, log_op_start, Attributes, FillPolicy, PivotRecord, Query, Record,
    RecordId, Registry,
};
use rusqlite::{Connection, TransactionBehavior};

use crate::config::StoreConfig;
use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations;
use crate::repo::unit_of_work::{Related, UnitOfWork};

pub struct RecordStore {
    conn: Connection,
    registry: Arc<Registry>,
    policy: FillPolicy,
    context: Option<RequestContext>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("entities", &self.registry.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl RecordStore {
    /// Open the configured database, validate the registry and migrate
    pub fn open(config: &StoreConfig, registry: Arc<Registry>) -> Result<Self> {
        let conn = db::connect(&config.database)?;
        Ok(Self::new(conn, registry)?.with_fill_policy(config.records.fill_policy))
    }

    /// Fresh in-memory store with default settings
    pub fn in_memory(registry: Arc<Registry>) -> Result<Self> {
        Self::open(&StoreConfig::in_memory(), registry)
    }

    /// Wrap an already configured connection
    ///
    /// Cross-entity references are validated before any table is created.
    pub fn new(mut conn: Connection, registry: Arc<Registry>) -> Result<Self> {
        registry.validate()?;
        migrations::apply_migrations(&mut conn, &registry)?;
        Ok(Self {
            conn,
            registry,
            policy: FillPolicy::default(),
            context: None,
        })
    }

    pub fn with_fill_policy(mut self, policy: FillPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a caller's request context to subsequent logs and errors
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn set_context(&mut self, context: Option<RequestContext>) {
        self.context = context;
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn fill_policy(&self) -> FillPolicy {
        self.policy
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a query against `entity`
    pub fn query(&self, entity: &str) -> Result<Query> {
        Ok(self.registry.query(entity)?)
    }

    // ===== Plumbing =====

    fn observe<T>(
        &self,
        op: &str,
        entity: &str,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let request_id = self.request_id();
        log_op_start!(op, entity = entity, request_id = request_id);

        let result = f(self).map_err(|e| self.enrich(e, op, entity));
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => log_op_end!(
                op,
                duration_ms = duration_ms,
                entity = entity,
                request_id = request_id
            ),
            Err(err) => log_op_error!(
                op,
                err,
                duration_ms = duration_ms,
                entity = entity,
                request_id = request_id
            ),
        }
        result
    }

    fn observe_mut<T>(
        &mut self,
        op: &str,
        entity: &str,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let request_id = self.request_id().to_string();
        log_op_start!(op, entity = entity, request_id = request_id.as_str());

        let result = self.write(f);
        let result = result.map_err(|e| self.enrich(e, op, entity));
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => log_op_end!(
                op,
                duration_ms = duration_ms,
                entity = entity,
                request_id = request_id.as_str()
            ),
            Err(err) => log_op_error!(
                op,
                err,
                duration_ms = duration_ms,
                entity = entity,
                request_id = request_id.as_str()
            ),
        }
        result
    }

    fn request_id(&self) -> &str {
        self.context
            .as_ref()
            .map(|c| c.request_id.as_str())
            .unwrap_or("")
    }

    fn enrich(&self, err: ExError, op: &str, entity: &str) -> ExError {
        let err = err.or_context(op, entity);
        match &self.context {
            Some(ctx) => {
                let err = err.with_request_id(ctx.request_id.clone());
                match &ctx.trace_id {
                    Some(trace) => err.with_trace_id(trace.clone()),
                    None => err,
                }
            }
            None => err,
        }
    }

    fn reader(&self) -> UnitOfWork<'_> {
        UnitOfWork::new(&self.conn, &self.registry, self.policy)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction; any error rolls back
    fn write<T>(&mut self, f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;

        let result = {
            let mut uow = UnitOfWork::new(&tx, &self.registry, self.policy);
            f(&mut uow)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(from_rusqlite)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    // ===== Operations =====

    /// Run several operations atomically
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use civitas_core::{attributes, platform_registry};
    /// # use civitas_store::RecordStore;
    /// let mut store = RecordStore::in_memory(Arc::new(platform_registry()?))?;
    /// store.transaction(|uow| {
    ///     let user = uow.create(
    ///         "users",
    ///         attributes! { "name" => "Ada", "email" => "ada@example.edu" },
    ///     )?;
    ///     uow.create(
    ///         "onboarding_steps",
    ///         attributes! { "user_id" => user.id, "step" => "profile", "position" => 1 },
    ///     )?;
    ///     Ok(())
    /// })?;
    /// # Ok::<(), civitas_core::ExError>(())
    /// ```
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T>,
    ) -> Result<T> {
        self.observe_mut("transaction", "*", f)
    }

    pub fn create(&mut self, entity: &str, attributes: Attributes) -> Result<Record> {
        self.observe_mut("create", entity, |uow| uow.create(entity, attributes))
    }

    pub fn find(&self, entity: &str, id: RecordId) -> Result<Option<Record>> {
        self.observe("find", entity, |s| s.reader().find(entity, id))
    }

    pub fn find_with_trashed(&self, entity: &str, id: RecordId) -> Result<Option<Record>> {
        self.observe("find_with_trashed", entity, |s| {
            s.reader().find_with_trashed(entity, id)
        })
    }

    pub fn find_or_fail(&self, entity: &str, id: RecordId) -> Result<Record> {
        self.observe("find_or_fail", entity, |s| s.reader().find_or_fail(entity, id))
    }

    pub fn get(&self, query: Query) -> Result<Vec<Record>> {
        let entity = query.entity().to_string();
        self.observe("get", &entity, |s| s.reader().get(query))
    }

    pub fn first(&self, query: Query) -> Result<Option<Record>> {
        let entity = query.entity().to_string();
        self.observe("first", &entity, |s| s.reader().first(query))
    }

    pub fn count(&self, query: Query) -> Result<u64> {
        let entity = query.entity().to_string();
        self.observe("count", &entity, |s| s.reader().count(query))
    }

    pub fn update(&mut self, entity: &str, id: RecordId, attributes: Attributes) -> Result<Record> {
        self.observe_mut("update", entity, |uow| uow.update(entity, id, attributes))
    }

    pub fn delete(&mut self, entity: &str, id: RecordId) -> Result<()> {
        self.observe_mut("delete", entity, |uow| uow.delete(entity, id))
    }

    pub fn force_delete(&mut self, entity: &str, id: RecordId) -> Result<()> {
        self.observe_mut("force_delete", entity, |uow| uow.force_delete(entity, id))
    }

    pub fn restore(&mut self, entity: &str, id: RecordId) -> Result<Record> {
        self.observe_mut("restore", entity, |uow| uow.restore(entity, id))
    }

    pub fn relate(&self, record: &Record, relation: &str) -> Result<Related> {
        self.observe("relate", &record.entity, |s| s.reader().relate(record, relation))
    }

    pub fn belongs_to(&self, record: &Record, relation: &str) -> Result<Option<Record>> {
        self.observe("belongs_to", &record.entity, |s| {
            s.reader().belongs_to(record, relation)
        })
    }

    pub fn has_one(&self, record: &Record, relation: &str) -> Result<Option<Record>> {
        self.observe("has_one", &record.entity, |s| s.reader().has_one(record, relation))
    }

    pub fn has_many(&self, record: &Record, relation: &str) -> Result<Query> {
        self.observe("has_many", &record.entity, |s| s.reader().has_many(record, relation))
    }

    pub fn belongs_to_many(&self, record: &Record, relation: &str) -> Result<Vec<PivotRecord>> {
        self.observe("belongs_to_many", &record.entity, |s| {
            s.reader().belongs_to_many(record, relation)
        })
    }

    pub fn attach(
        &mut self,
        record: &Record,
        relation: &str,
        related: RecordId,
        pivot: Attributes,
    ) -> Result<()> {
        self.observe_mut("attach", &record.entity, |uow| {
            uow.attach(record, relation, related, pivot)
        })
    }

    pub fn detach(
        &mut self,
        record: &Record,
        relation: &str,
        related: Option<RecordId>,
    ) -> Result<usize> {
        self.observe_mut("detach", &record.entity, |uow| {
            uow.detach(record, relation, related)
        })
    }

    pub fn update_pivot(
        &mut self,
        record: &Record,
        relation: &str,
        related: RecordId,
        pivot: Attributes,
    ) -> Result<()> {
        self.observe_mut("update_pivot", &record.entity, |uow| {
            uow.update_pivot(record, relation, related, pivot)
        })
    }
}
