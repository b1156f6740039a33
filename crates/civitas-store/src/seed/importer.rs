//! Seed importer orchestration
//!
//! Imports a validated seed through the record store so casts, allow-lists
//! and hooks apply exactly as they do for any other caller.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::path::Path;

use civitas_core::{Attributes, RecordId, Value};

use crate::errors::{seed_validation, Result};
use crate::repo::RecordStore;
use crate::seed::format_v0::{SeedV0, SeedValue};
use crate::seed::{compute_seed_digest, parse_seed_file, provenance, validate_entities};

/// Outcome of a successful import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub seed_digest: String,
    /// `(entity, id)` of every created record, in seed order
    pub created: Vec<(String, RecordId)>,
    /// Ids assigned to keyed records
    pub keys: BTreeMap<String, RecordId>,
}

/// Import a seed file into the store
pub fn import_seed_file(store: &mut RecordStore, path: &Path) -> Result<ImportReport> {
    let seed = parse_seed_file(path)?;
    let source = path.to_string_lossy().into_owned();
    import_seed(store, &seed, Some(&source))
}

/// Import a parsed seed
///
/// All records are created in one unit of work together with the
/// provenance row: either the whole seed lands or nothing does.
pub fn import_seed(
    store: &mut RecordStore,
    seed: &SeedV0,
    source: Option<&str>,
) -> Result<ImportReport> {
    validate_entities(seed, store.registry())?;
    let seed_digest = compute_seed_digest(seed)?;

    let report = store.transaction(|uow| {
        let mut report = ImportReport {
            seed_digest: seed_digest.clone(),
            created: Vec::with_capacity(seed.records.len()),
            keys: BTreeMap::new(),
        };

        for record in &seed.records {
            let mut attributes = Attributes::new();
            for (name, value) in &record.fields {
                let value = match SeedValue::classify(value) {
                    SeedValue::Reference(key) => {
                        let id = report.keys.get(key).ok_or_else(|| {
                            seed_validation(&format!("Unresolved reference '@{}'", key))
                        })?;
                        Value::from(*id)
                    }
                    SeedValue::Escaped(text) => Value::from(text),
                    SeedValue::Plain(json) => Value::from_json(json.clone()),
                };
                attributes.insert(name.clone(), value);
            }

            let created = uow.create(&record.entity, attributes)?;
            if let Some(key) = &record.key {
                report.keys.insert(key.clone(), created.id);
            }
            report.created.push((record.entity.clone(), created.id));
        }

        provenance::record_import(uow.connection(), &seed_digest, source, report.created.len())?;
        Ok(report)
    })?;

    tracing::info!(
        seed_digest = %report.seed_digest,
        records = report.created.len(),
        "seed imported"
    );
    Ok(report)
}
