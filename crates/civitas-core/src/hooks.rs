//! Lifecycle hooks
//!
//! Hooks are side effects that run after a record is written. They execute
//! inside the same unit of work as the triggering write: if a hook fails,
//! the store rolls the whole operation back.
//!
//! The common case, keeping a parent's counter column in step with the
//! number of its live children, is provided by `CounterHook`.

use std::fmt;

use crate::errors::ExError;
use crate::record::{Record, RecordId};

/// Point in a record's lifecycle at which a hook fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    AfterCreate,
    /// Fires for soft deletes and for hard deletes of live rows
    AfterDelete,
    AfterRestore,
    /// Fires after a partial update, with the row as it was before
    AfterUpdate,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::AfterCreate => "after_create",
            HookEvent::AfterDelete => "after_delete",
            HookEvent::AfterRestore => "after_restore",
            HookEvent::AfterUpdate => "after_update",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write access a hook gets to the unit of work it runs in
pub trait HookContext {
    /// Atomically add `delta` to an integer column of one row
    ///
    /// # Arguments
    /// * `entity` - Entity that owns the counter
    /// * `id` - Row to adjust
    /// * `field` - Integer counter column
    /// * `delta` - Signed amount to add
    ///
    /// # Errors
    /// `NotFound` when the row does not exist; `Persistence` on storage failure
    fn adjust_counter(
        &mut self,
        entity: &str,
        id: RecordId,
        field: &str,
        delta: i64,
    ) -> Result<(), ExError>;
}

/// A side effect bound to a lifecycle event
pub trait LifecycleHook: Send + Sync {
    /// Short name used in logs and hook errors
    fn name(&self) -> &str;

    /// Run the side effect for `record`
    ///
    /// Any error aborts the triggering operation.
    fn run(&self, ctx: &mut dyn HookContext, record: &Record) -> Result<(), ExError>;

    /// Run the side effect for an update from `before` to `after`
    ///
    /// Defaults to `run` on the updated record.
    fn run_update(
        &self,
        ctx: &mut dyn HookContext,
        before: &Record,
        after: &Record,
    ) -> Result<(), ExError> {
        let _ = before;
        self.run(ctx, after)
    }

    /// `(parent entity, foreign key, counter field)` for counter-maintaining hooks
    ///
    /// Used to validate the registry; other hooks keep the default.
    fn counter_target(&self) -> Option<(&str, &str, &str)> {
        None
    }
}

/// Adds `delta` to `parent.counter` for the parent referenced by `foreign_key`
///
/// Rows whose foreign key is null are skipped. A foreign key that points at
/// a missing parent is an error. On update the hook only acts when the
/// foreign key changed: `delta` moves from the old parent to the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterHook {
    name: String,
    parent: String,
    foreign_key: String,
    counter: String,
    delta: i64,
}

impl CounterHook {
    pub fn new(parent: &str, foreign_key: &str, counter: &str, delta: i64) -> Self {
        Self {
            name: format!("counter:{}.{}{:+}", parent, counter, delta),
            parent: parent.to_string(),
            foreign_key: foreign_key.to_string(),
            counter: counter.to_string(),
            delta,
        }
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }
}

impl LifecycleHook for CounterHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut dyn HookContext, record: &Record) -> Result<(), ExError> {
        let Some(parent_id) = record.foreign_id(&self.foreign_key) else {
            return Ok(());
        };
        ctx.adjust_counter(&self.parent, parent_id, &self.counter, self.delta)
    }

    fn run_update(
        &self,
        ctx: &mut dyn HookContext,
        before: &Record,
        after: &Record,
    ) -> Result<(), ExError> {
        let old = before.foreign_id(&self.foreign_key);
        let new = after.foreign_id(&self.foreign_key);
        if old == new {
            return Ok(());
        }
        if let Some(old) = old {
            ctx.adjust_counter(&self.parent, old, &self.counter, -self.delta)?;
        }
        if let Some(new) = new {
            ctx.adjust_counter(&self.parent, new, &self.counter, self.delta)?;
        }
        Ok(())
    }

    fn counter_target(&self) -> Option<(&str, &str, &str)> {
        Some((&self.parent, &self.foreign_key, &self.counter))
    }
}

type HookFn = dyn Fn(&mut dyn HookContext, &Record) -> Result<(), ExError> + Send + Sync;

/// Hook backed by a closure
pub struct FnHook {
    name: String,
    f: Box<HookFn>,
}

impl FnHook {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut dyn HookContext, &Record) -> Result<(), ExError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for FnHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHook").field("name", &self.name).finish()
    }
}

impl LifecycleHook for FnHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut dyn HookContext, record: &Record) -> Result<(), ExError> {
        (self.f)(ctx, record)
    }
}
