//! Store configuration
//!
//! Loaded from an optional TOML file and `CIVITAS__*` environment variables
//! (e.g. `CIVITAS__DATABASE__PATH`, `CIVITAS__RECORDS__FILL_POLICY`).

use std::path::Path;

use civitas_core::logging_facility::Profile;
use civitas_core::schema::FillPolicy;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::{config_error, Result};

/// Path value that selects an in-memory database
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    pub wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "civitas.db".to_string(),
            busy_timeout_ms: 5000,
            foreign_keys: true,
            wal: true,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RecordsConfig {
    #[serde(default)]
    pub fill_policy: FillPolicy,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StoreConfig {
    /// Load configuration, layering the environment over `path` over defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = DatabaseConfig::default();
        let mut builder = Config::builder()
            .set_default("database.path", defaults.path)
            .and_then(|b| b.set_default("database.busy_timeout_ms", defaults.busy_timeout_ms))
            .and_then(|b| b.set_default("database.foreign_keys", defaults.foreign_keys))
            .and_then(|b| b.set_default("database.wal", defaults.wal))
            .map_err(config_error)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("CIVITAS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_error)
    }

    /// Configuration for a throwaway in-memory store
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseConfig {
                path: IN_MEMORY.to_string(),
                wal: false,
                ..DatabaseConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn with_fill_policy(mut self, policy: FillPolicy) -> Self {
        self.records.fill_policy = policy;
        self
    }
}
