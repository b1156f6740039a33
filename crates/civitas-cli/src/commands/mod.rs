pub mod records;
pub mod schema;
pub mod seed;

use std::sync::Arc;

use civitas_core::errors::{ExError, ExErrorKind};
use civitas_core::platform_registry;
use civitas_store::{RecordStore, StoreConfig};
use serde_json::Value as JsonValue;

/// Open the configured database over the platform catalog, migrating it
pub fn open_store(config: &StoreConfig) -> civitas_store::Result<RecordStore> {
    let registry = Arc::new(platform_registry()?);
    RecordStore::open(config, registry)
}

/// Print a JSON document to stdout
pub fn print_json(value: &JsonValue) -> civitas_store::Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| {
        ExError::new(ExErrorKind::Serialization)
            .with_op("print")
            .with_message(e.to_string())
    })?;
    println!("{}", rendered);
    Ok(())
}
