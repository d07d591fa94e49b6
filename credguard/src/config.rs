//! Configuration loader. A single JSON file carries the database location,
//! the password hashing cost and the logger settings; omitted fields fall
//! back to their defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::passwords::HashCost;
use crate::logging::LoggerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(#[source] io::Error),
    #[error("config parse failed: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub database_path: PathBuf,
    pub hash_cost: HashCost,
    /// Milliseconds each backend call may take before it is abandoned.
    pub backend_timeout_ms: u64,
    pub logger: LoggerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("credentials.db"),
            hash_cost: HashCost::default(),
            backend_timeout_ms: 5_000,
            logger: LoggerConfig::default(),
        }
    }
}

/// Loads the JSON configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    serde_json::from_str(&raw_json).map_err(ConfigError::Parse)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    match load_config(&path) {
        Err(ConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
            Ok(RuntimeConfig::default())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{load_config, load_config_or_default, ConfigError, RuntimeConfig};
    use crate::crypto::passwords::HashCost;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn loads_full_config() {
        let payload = json!({
            "database_path": "/var/lib/credguard/credentials.db",
            "hash_cost": { "memory_kib": 8192, "iterations": 3, "parallelism": 2 },
            "backend_timeout_ms": 250,
            "logger": {
                "level": "debug",
                "sampling": null,
                "encoding": "console",
                "output_paths": ["stdout"],
                "error_output_paths": ["stderr", "/tmp/credguard-errors.log"]
            }
        });

        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), serde_json::to_vec(&payload).expect("json")).expect("write");

        let config = load_config(file.path()).expect("config should load");
        assert_eq!(config.database_path, PathBuf::from("/var/lib/credguard/credentials.db"));
        assert_eq!(
            config.hash_cost,
            HashCost {
                memory_kib: 8192,
                iterations: 3,
                parallelism: 2
            }
        );
        assert_eq!(config.backend_timeout_ms, 250);
        assert_eq!(config.logger.level, "debug");
        assert!(config.logger.sampling.is_none());
        assert_eq!(config.logger.error_output_paths.len(), 2);
    }

    #[test]
    fn omitted_fields_use_defaults() {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), br#"{ "hash_cost": { "iterations": 4 } }"#).expect("write");

        let config = load_config(file.path()).expect("config should load");
        let defaults = RuntimeConfig::default();
        assert_eq!(config.database_path, defaults.database_path);
        assert_eq!(config.hash_cost.iterations, 4);
        assert_eq!(config.hash_cost.memory_kib, HashCost::default().memory_kib);
        assert_eq!(config.logger, defaults.logger);
    }

    #[test]
    fn surfaces_parse_errors() {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), b"{ not json").expect("write");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("absent.json");
        assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
        assert_eq!(load_config_or_default(&path).expect("defaults"), RuntimeConfig::default());
    }
}
