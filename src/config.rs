//! Configuration for the Passerby Edge Agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the edge agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Installation identifier (combined with the hostname into the device id)
    pub site_id: String,

    /// Seconds between scan ticks
    pub scan_interval_secs: u64,

    /// Scans per reporting cycle (flush + sync cadence)
    pub scans_per_cycle: u32,

    /// Safety cap on stations classified per scan
    pub max_stations_per_scan: usize,

    /// Budget for the initial GPS acquisition at bring-up (seconds)
    pub initial_fix_timeout_secs: u64,

    /// Coordinates substituted when GPS acquisition times out
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,

    /// Path for the local logbook and other agent state
    pub data_path: PathBuf,

    /// Remote store endpoint (used by the `http-store` feature)
    pub store_url: Option<String>,

    /// Auth token for the remote store
    pub store_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("passerby-edge-agent");

        Self {
            site_id: "site-01".to_string(),
            scan_interval_secs: 5,
            scans_per_cycle: 10,
            max_stations_per_scan: 20,
            initial_fix_timeout_secs: 90,
            fallback_latitude: 33.61095,
            fallback_longitude: 73.061333,
            data_path: data_dir,
            store_url: None,
            store_token: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("passerby-edge-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path of the local logbook file.
    pub fn logbook_path(&self) -> PathBuf {
        self.data_path.join("agent_log.txt")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan_interval_secs, 5);
        assert_eq!(config.scans_per_cycle, 10);
        assert_eq!(config.max_stations_per_scan, 20);
        assert_eq!(config.initial_fix_timeout_secs, 90);
        assert!(config.store_url.is_none());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let mut config = Config::default();
        config.site_id = "rooftop-7".to_string();
        config.store_url = Some("https://store.example.com".to_string());

        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.site_id, "rooftop-7");
        assert_eq!(loaded.scans_per_cycle, config.scans_per_cycle);
        assert_eq!(
            loaded.store_url.as_deref(),
            Some("https://store.example.com")
        );
    }

    #[test]
    fn test_logbook_path_is_under_data_path() {
        let config = Config::default();
        assert!(config.logbook_path().starts_with(&config.data_path));
    }
}
