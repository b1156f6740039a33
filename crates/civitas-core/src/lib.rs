//! Civitas Core - typed records, relationships and query scopes
//!
//! This crate is the pure (no I/O) half of the Civitas record store:
//! - Entity schemas with casts, allow-lists, relations, scopes and hooks
//! - Typed values and hydrated records
//! - Composable queries and named scopes
//! - Derived computations used by computed attributes
//! - The platform entity catalog
//! - Error and logging facilities shared with the storage crate

pub mod catalog;
pub mod derived;
pub mod errors;
pub mod hooks;
pub mod logging_facility;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;
pub mod value;

// Re-exported so the logging macros can reach the canonical field names
pub use civitas_core_types;

pub use catalog::platform_registry;
pub use errors::{ExError, ExErrorKind, RecordError, Result};
pub use hooks::{CounterHook, FnHook, HookContext, HookEvent, LifecycleHook};
pub use query::{Direction, OrderBy, Predicate, Query, ScopeArgs, Trashed};
pub use record::{Attributes, PivotRecord, Record, RecordId};
pub use registry::Registry;
pub use schema::{EntitySchema, FieldDef, FieldType, FillPolicy, SchemaBuilder, WriteMode};
pub use value::Value;
