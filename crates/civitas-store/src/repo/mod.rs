//! Repository layer: typed records over SQLite
//!
//! - `RecordStore`: owns the connection, one unit of work per operation
//! - `UnitOfWork`: the operations themselves, bound to a transaction
//! - `hydration`: rows back into records

pub mod hydration;
pub mod record_store;
pub mod unit_of_work;

pub use record_store::RecordStore;
pub use unit_of_work::{Related, UnitOfWork};
