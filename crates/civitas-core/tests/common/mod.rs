use chrono::{DateTime, TimeZone, Utc};
use civitas_core::{Attributes, Record, RecordId, Registry};

/// The full platform catalog
#[allow(dead_code)]
pub fn registry() -> Registry {
    civitas_core::platform_registry().unwrap()
}

/// A loaded record built by hand, as the store would hydrate it
#[allow(dead_code)]
pub fn record(entity: &str, id: i64, attributes: Attributes) -> Record {
    Record {
        entity: entity.to_string(),
        id: RecordId(id),
        attributes,
        created_at: Some(ts(2025, 1, 1, 0)),
        updated_at: Some(ts(2025, 1, 1, 0)),
        deleted_at: None,
    }
}

#[allow(dead_code)]
pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}
