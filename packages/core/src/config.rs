//! Store configuration
//!
//! `StoreConfig` selects and parameterizes the node store backend. It is
//! normally built once at process start from environment variables and then
//! used to initialize the shared store handle (see [`crate::db::shared_store`]).
//!
//! # Environment Variables
//!
//! - `DOCNODE_STORE_BACKEND`: `memory` (default) or `surreal`
//! - `DOCNODE_DB_PATH`: on-disk database directory (required for `surreal`)
//! - `DOCNODE_NAMESPACE`: SurrealDB namespace (default `docnode`)
//! - `DOCNODE_DATABASE`: SurrealDB database (default `tree`)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_BACKEND: &str = "DOCNODE_STORE_BACKEND";
pub const ENV_DB_PATH: &str = "DOCNODE_DB_PATH";
pub const ENV_NAMESPACE: &str = "DOCNODE_NAMESPACE";
pub const ENV_DATABASE: &str = "DOCNODE_DATABASE";

/// Which node store implementation to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local `MemoryStore`
    #[default]
    Memory,
    /// Embedded SurrealDB (requires the `surrealdb` feature)
    Surreal,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "surreal" | "surrealdb" => Ok(StoreBackend::Surreal),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Configuration for the node store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database directory for on-disk backends
    pub database_path: Option<PathBuf>,

    pub namespace: String,

    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_path: None,
            namespace: "docnode".to_string(),
            database: "tree".to_string(),
        }
    }
}

impl StoreConfig {
    /// Build configuration from `DOCNODE_*` environment variables
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup(ENV_BACKEND) {
            config.backend = backend.parse()?;
        }
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            config.namespace = namespace;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            config.database = database;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.trim().is_empty() {
            return Err("namespace cannot be empty".to_string());
        }

        if self.database.trim().is_empty() {
            return Err("database cannot be empty".to_string());
        }

        if self.backend == StoreBackend::Surreal && self.database_path.is_none() {
            return Err(format!(
                "{} must be set when using the surreal backend",
                ENV_DB_PATH
            ));
        }

        Ok(())
    }
}
