//! Platform entity catalog
//!
//! Schema declarations for every entity of the alumni engagement platform,
//! one module per product area. `platform_registry()` defines them all and
//! validates the cross-entity references.

mod campaigns;
mod career;
mod events;
mod experiments;
mod forums;
mod imports;
mod invitations;
mod messaging;
mod people;
mod reunions;
mod scholarships;
mod video;
mod webhooks;

use chrono::Utc;

use crate::errors::Result;
use crate::record::Record;
use crate::registry::Registry;
use crate::value::Value;

/// Registry holding the full platform catalog, validated
pub fn platform_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    people::define(&mut registry)?;
    experiments::define(&mut registry)?;
    forums::define(&mut registry)?;
    events::define(&mut registry)?;
    scholarships::define(&mut registry)?;
    webhooks::define(&mut registry)?;
    reunions::define(&mut registry)?;
    messaging::define(&mut registry)?;
    campaigns::define(&mut registry)?;
    career::define(&mut registry)?;
    video::define(&mut registry)?;
    imports::define(&mut registry)?;
    invitations::define(&mut registry)?;
    registry.validate()?;
    Ok(registry)
}

// Computed attributes are plain `fn(&Record) -> Value`; the helpers below
// read the current time for the time-relative ones.

fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}

fn count(record: &Record, field: &str) -> i64 {
    record.integer(field).unwrap_or(0)
}

fn decimal_value(value: Option<f64>) -> Value {
    value.map(Value::Decimal).unwrap_or(Value::Null)
}
