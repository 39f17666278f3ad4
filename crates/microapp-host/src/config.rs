//! Host configuration storage
//!
//! Handles persistent storage of tick, history and storage settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use blueprint_engine::HealingPolicy;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{defaults, paths};

/// Full host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Milliseconds between timer ticks
    pub tick_interval_ms: u64,
    /// JSON file holding the app list (in-memory only when unset)
    pub storage_path: Option<PathBuf>,
    /// Data snapshots kept per app for undo/redo
    pub history_depth: usize,
    /// Label of a list item added without a value
    pub placeholder_label: String,
    /// How mutations resolve a requested key that is missing
    pub healing_policy: HealingPolicy,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: defaults::TICK_INTERVAL_MS,
            storage_path: None,
            history_depth: defaults::HISTORY_DEPTH,
            placeholder_label: defaults::PLACEHOLDER_LABEL.to_string(),
            healing_policy: HealingPolicy::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from disk
    ///
    /// A missing file yields the defaults.
    pub async fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = data_dir.join(paths::CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await.map_err(ConfigError::Io)?;

        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to disk
    pub async fn save(&self, data_dir: &Path) -> Result<(), ConfigError> {
        // Ensure directory exists
        fs::create_dir_all(data_dir).await.map_err(ConfigError::Io)?;

        let config_path = data_dir.join(paths::CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        fs::write(&config_path, contents).await.map_err(ConfigError::Io)?;

        log::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig::load(dir.path()).await.unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.placeholder_label, "New item");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig {
            tick_interval_ms: 250,
            storage_path: Some(dir.path().join("apps.json")),
            history_depth: 5,
            placeholder_label: "Todo".to_string(),
            healing_policy: HealingPolicy::PreferExisting,
        };
        config.save(dir.path()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
        assert!(raw.contains("tickIntervalMs"));
        assert!(raw.contains("prefer_existing"));

        let loaded = HostConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"historyDepth": 3}"#).unwrap();
        let config = HostConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.history_depth, 3);
        assert_eq!(config.tick_interval_ms, 1000);
    }

    #[tokio::test]
    async fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "not json").unwrap();
        let err = HostConfig::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
