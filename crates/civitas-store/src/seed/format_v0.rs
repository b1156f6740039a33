//! Seed Format v0 schema
//!
//! Defines the YAML structure for fixture seeds:
//!
//! ```yaml
//! schema_version: 0
//! records:
//!   - entity: users
//!     key: alice
//!     fields: { name: Alice, email: alice@example.edu }
//!   - entity: forum_threads
//!     fields: { title: Hello, user_id: "@alice" }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Prefix marking a field value as a reference to an earlier record's key
pub const REFERENCE_PREFIX: char = '@';

/// Top-level seed file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedV0 {
    /// Schema version (must be 0 for this format)
    pub schema_version: u32,

    /// Records to create, in order
    #[serde(default)]
    pub records: Vec<SeedRecord>,
}

/// One record to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedRecord {
    pub entity: String,

    /// Name later records use to reference this one as `"@key"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default)]
    pub fields: BTreeMap<String, JsonValue>,
}

/// A field value as the seed author wrote it
#[derive(Debug, Clone, PartialEq)]
pub enum SeedValue<'a> {
    /// `"@key"`: the id of an earlier record
    Reference(&'a str),
    /// `"@@text"`: the literal string `"@text"`
    Escaped(&'a str),
    Plain(&'a JsonValue),
}

impl<'a> SeedValue<'a> {
    pub fn classify(value: &'a JsonValue) -> Self {
        match value.as_str() {
            Some(s) if s.starts_with("@@") => SeedValue::Escaped(&s[1..]),
            Some(s) if s.starts_with(REFERENCE_PREFIX) => SeedValue::Reference(&s[1..]),
            _ => SeedValue::Plain(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_seed() {
        let yaml = r#"
schema_version: 0
records:
  - entity: users
    key: alice
    fields:
      name: Alice
      email: alice@example.edu
"#;

        let seed: SeedV0 = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(seed.schema_version, 0);
        assert_eq!(seed.records.len(), 1);
        assert_eq!(seed.records[0].key.as_deref(), Some("alice"));
        assert_eq!(seed.records[0].fields["name"], json!("Alice"));
    }

    #[test]
    fn test_records_default_to_empty() {
        let seed: SeedV0 = serde_yaml::from_str("schema_version: 0\n").unwrap();
        assert!(seed.records.is_empty());
    }

    #[test]
    fn test_classify_values() {
        let reference = json!("@alice");
        let escaped = json!("@@handle");
        let plain = json!(3);
        assert_eq!(SeedValue::classify(&reference), SeedValue::Reference("alice"));
        assert_eq!(SeedValue::classify(&escaped), SeedValue::Escaped("@handle"));
        assert_eq!(SeedValue::classify(&plain), SeedValue::Plain(&plain));
    }
}
