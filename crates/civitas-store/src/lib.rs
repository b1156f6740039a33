//! Civitas Store - SQLite persistence for typed records
//!
//! Provides:
//! - Connection setup and layered configuration
//! - Migrations generated from entity schemas, with checksums
//! - Column encodings and query rendering
//! - `RecordStore`: CRUD, soft deletes, relations, pivots and units of work
//! - Seed Format v0 parser and importer

pub mod codec;
pub mod config;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;
pub mod seed;
pub mod sql;

// Re-export key types
pub use config::StoreConfig;
pub use errors::Result;
pub use repo::{RecordStore, Related, UnitOfWork};
