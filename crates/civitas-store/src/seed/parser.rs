//! Seed parser with validation
//!
//! Parses YAML and validates schema version, key uniqueness and that every
//! reference points at an earlier record of the same seed

#![allow(clippy::result_large_err)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use civitas_core::Registry;

use crate::errors::{io_error, seed_validation, Result};
use crate::seed::format_v0::{SeedV0, SeedValue};

/// Parse a seed file from a path
pub fn parse_seed_file(path: &Path) -> Result<SeedV0> {
    let content = fs::read_to_string(path).map_err(|e| io_error("seed_read", e))?;
    parse_seed_str(&content)
}

/// Parse a seed from a string
pub fn parse_seed_str(content: &str) -> Result<SeedV0> {
    let seed: SeedV0 = serde_yaml::from_str(content)
        .map_err(|e| seed_validation(&format!("YAML parse error: {}", e)))?;

    validate_seed(&seed)?;

    Ok(seed)
}

/// Check that every entity in the seed is registered
pub fn validate_entities(seed: &SeedV0, registry: &Registry) -> Result<()> {
    for (index, record) in seed.records.iter().enumerate() {
        if !registry.contains(&record.entity) {
            return Err(seed_validation(&format!(
                "Record {} uses unknown entity '{}'",
                index, record.entity
            )));
        }
    }
    Ok(())
}

/// Validate a parsed seed
fn validate_seed(seed: &SeedV0) -> Result<()> {
    if seed.schema_version != 0 {
        return Err(seed_validation(&format!(
            "Unsupported schema_version: {}. Expected 0",
            seed.schema_version
        )));
    }

    let mut keys = HashSet::new();
    for (index, record) in seed.records.iter().enumerate() {
        for (field, value) in &record.fields {
            if let SeedValue::Reference(target) = SeedValue::classify(value) {
                if !keys.contains(target) {
                    return Err(seed_validation(&format!(
                        "Record {} ({}) field '{}' references unknown or later key '@{}'",
                        index, record.entity, field, target
                    )));
                }
            }
        }

        if let Some(key) = &record.key {
            if !keys.insert(key.as_str()) {
                return Err(seed_validation(&format!("Duplicate key '{}'", key)));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::errors::ExErrorKind;

    #[test]
    fn test_parse_valid_seed() {
        let yaml = r#"
schema_version: 0
records:
  - entity: users
    key: alice
    fields: { name: Alice, email: alice@example.edu }
  - entity: forum_threads
    fields: { title: Hello, user_id: "@alice" }
"#;

        let seed = parse_seed_str(yaml).unwrap();
        assert_eq!(seed.records.len(), 2);
    }

    #[test]
    fn test_reject_invalid_schema_version() {
        let err = parse_seed_str("schema_version: 99\nrecords: []\n").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Validation);
        assert!(err.to_string().contains("schema_version"));
    }

    #[test]
    fn test_reject_duplicate_key() {
        let yaml = r#"
schema_version: 0
records:
  - { entity: users, key: alice, fields: { name: A } }
  - { entity: users, key: alice, fields: { name: B } }
"#;
        let err = parse_seed_str(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate key"));
    }

    #[test]
    fn test_reject_forward_reference() {
        let yaml = r#"
schema_version: 0
records:
  - { entity: forum_threads, fields: { user_id: "@bob" } }
  - { entity: users, key: bob, fields: { name: Bob } }
"#;
        let err = parse_seed_str(yaml).unwrap_err();
        assert!(err.to_string().contains("@bob"));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let yaml = r#"
schema_version: 0
records:
  - { entity: users, key: carol, fields: { mentor_id: "@carol" } }
"#;
        assert!(parse_seed_str(yaml).is_err());
    }

    #[test]
    fn test_unknown_entity() {
        let seed = parse_seed_str("schema_version: 0\nrecords:\n  - { entity: ghosts }\n").unwrap();
        let registry = civitas_core::platform_registry().unwrap();
        let err = validate_entities(&seed, &registry).unwrap_err();
        assert!(err.to_string().contains("ghosts"));
    }
}
