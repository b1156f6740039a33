//! Core types shared across Civitas facilities
//!
//! This crate provides foundational types used by both the error and
//! logging facilities of the record store:
//!
//! - **Correlation types**: RequestId, TraceId, RequestContext
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{RequestContext, RequestId, TraceId};
