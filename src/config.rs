//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub paging: PagingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            oracle: OracleConfig::default(),
            paging: PagingConfig::default(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dayplan")
        .join("dayplan.db")
}

/// Oracle (suggestion/parsing backend) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Timeout for a single oracle call in seconds.
    #[serde(default = "default_oracle_timeout")]
    pub timeout_seconds: u64,

    /// IANA timezone used when resolving relative dates in parsed input.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_oracle_timeout(),
            timezone: default_timezone(),
        }
    }
}

fn default_oracle_timeout() -> u64 {
    10
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Pagination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Page size used when the caller does not supply one. Clamped to the
    /// same 1..=100 range as explicit limits.
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> i64 {
    50
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the default location or return defaults,
    /// with environment variable overrides applied on top.
    pub fn load_or_default() -> Self {
        let mut config = Self::default_config_path()
            .and_then(|path| Self::load(path).ok())
            .unwrap_or_default();

        if let Ok(db_path) = std::env::var("DAYPLAN_DB_PATH") {
            config.storage.db_path = PathBuf::from(db_path);
        }

        if let Ok(timeout) = std::env::var("DAYPLAN_ORACLE_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                config.oracle.timeout_seconds = timeout;
            }
        }

        config
    }

    /// Default config file location (`<config dir>/dayplan/config.yaml`).
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dayplan").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.paging.default_page_size, 50);
        assert_eq!(config.oracle.timeout_seconds, 10);
        assert_eq!(config.oracle.timezone, "UTC");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("oracle:\n  timeout_seconds: 3\n").unwrap();
        assert_eq!(config.oracle.timeout_seconds, 3);
        assert_eq!(config.paging.default_page_size, 50);
    }
}
