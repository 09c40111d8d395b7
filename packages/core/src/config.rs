//! Runtime configuration
//!
//! `FlowConfig` is loaded from an optional JSON file. Every field has a
//! serde default, so partial or older files keep deserializing. A couple of
//! environment variables override the file for local runs.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Overrides `cache_dir`
pub const CACHE_DIR_ENV: &str = "FLOWLIST_CACHE_DIR";
/// Overrides `cache_namespace`
pub const CACHE_NAMESPACE_ENV: &str = "FLOWLIST_CACHE_NAMESPACE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Prefix of every local cache key
    pub cache_namespace: String,

    /// Cache entries older than this are purged at startup
    pub cache_retention_days: i64,

    /// Directory for the file-backed cache; in-memory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Buffer size of the graph event broadcast channel
    pub event_channel_capacity: usize,

    /// Mirror every mutation into the local cache
    pub autosave: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            cache_namespace: "flowlist".to_string(),
            cache_retention_days: 7,
            cache_dir: None,
            event_channel_capacity: 256,
            autosave: true,
        }
    }
}

impl FlowConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FlowConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `FLOWLIST_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                self.cache_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(namespace) = std::env::var(CACHE_NAMESPACE_ENV) {
            if !namespace.is_empty() {
                self.cache_namespace = namespace;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_namespace.is_empty() {
            return Err(ConfigError::Invalid(
                "cache_namespace cannot be empty".to_string(),
            ));
        }

        if self.cache_namespace.contains(':') {
            return Err(ConfigError::Invalid(
                "cache_namespace cannot contain ':'".to_string(),
            ));
        }

        if self.cache_retention_days <= 0 {
            return Err(ConfigError::Invalid(
                "cache_retention_days must be greater than 0".to_string(),
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_channel_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn cache_retention(&self) -> Duration {
        Duration::days(self.cache_retention_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = FlowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_retention(), Duration::days(7));
    }

    #[test]
    fn test_validation_failures() {
        let config = FlowConfig {
            cache_namespace: String::new(),
            ..FlowConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FlowConfig {
            cache_namespace: "a:b".to_string(),
            ..FlowConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FlowConfig {
            cache_retention_days: 0,
            ..FlowConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FlowConfig {
            event_channel_capacity: 0,
            ..FlowConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = FlowConfig::load_from_file(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, FlowConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flowlist.json");
        std::fs::write(&path, r#"{ "cache_retention_days": 3 }"#).unwrap();

        let config = FlowConfig::load_from_file(&path).unwrap();
        assert_eq!(config.cache_retention_days, 3);
        assert_eq!(config.cache_namespace, "flowlist");
        assert!(config.autosave);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flowlist.json");

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FlowConfig::load_from_file(&path),
            Err(ConfigError::Parse { .. })
        ));

        std::fs::write(&path, r#"{ "cache_namespace": "" }"#).unwrap();
        assert!(matches!(
            FlowConfig::load_from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
