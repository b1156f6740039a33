//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums
//! - Idempotent application
//! - Embedded bookkeeping SQL plus one generated migration per table

mod checksums;
pub mod ddl;
mod embedded;
mod runner;

pub use checksums::compute_checksum;
pub use runner::{applied_migrations, apply_migrations, AppliedMigration};
