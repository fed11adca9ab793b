//! Configuration management for the CLI
//!
//! This module handles loading and merging configuration from:
//! - Default values
//! - Configuration files (YAML/JSON)
//! - Environment variables
//! - Command-line arguments

use crate::error::{Error, Result};
use crate::session::AuthConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use waypoint_client::ClientConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Client settings: base URL, timeouts, retries, default headers
    pub api: ClientConfig,

    /// Session refresh settings
    pub auth: AuthConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Use colored output by default
    pub color: bool,

    /// Redact tokens and passwords from printed bodies
    pub redact: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            redact: true,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;

        let config = if is_yaml(path) {
            serde_yaml::from_str(&content).map_err(|_| Error::InvalidFormat {
                path: path.to_path_buf(),
                expected: "YAML".to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|_| Error::InvalidFormat {
                path: path.to_path_buf(),
                expected: "JSON".to_string(),
            })?
        };

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => {
                        tracing::debug!(path = %path.display(), "Loaded configuration");
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to load config");
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file or default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        let config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::load()?,
        };
        config.with_env()
    }

    /// Overlay the `WAYPOINT_*` environment variables on the client settings
    pub fn with_env(mut self) -> Result<Self> {
        self.api = self.api.with_env()?;
        Ok(self)
    }

    /// Path of the per-user config file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("waypoint").join("config.yaml"))
    }

    /// Get default configuration file paths to check
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".waypoint.yaml"),
            PathBuf::from(".waypoint.yml"),
            PathBuf::from(".waypoint.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let waypoint_dir = config_dir.join("waypoint");
            paths.push(waypoint_dir.join("config.yaml"));
            paths.push(waypoint_dir.join("config.json"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".waypoint.yaml"));
            paths.push(home_dir.join(".waypoint.json"));
        }

        paths
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.api.base_url = "https://api.waypoint.app/api".to_string();
        config.api.retry = config.api.retry.with_base_delay(Duration::from_millis(500));
        config.auth.refresh_path = "/v2/session/refresh".to_string();
        config.output.redact = false;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.api.base_url, "https://api.waypoint.app/api");
        assert_eq!(loaded.api.retry.base_delay_ms, 500);
        assert_eq!(loaded.api.retry.max_retries, 3);
        assert_eq!(loaded.auth.refresh_path, "/v2/session/refresh");
        assert!(!loaded.output.redact);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api": {"base_url": "https://staging.waypoint.app", "timeout_secs": 5}}"#)
            .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api.base_url, "https://staging.waypoint.app");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.api.retry.max_retries, 3);
        assert_eq!(config.auth, AuthConfig::default());
        assert!(config.output.color);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(Error::FileNotFound { .. })
        ));

        let malformed = dir.path().join("broken.json");
        std::fs::write(&malformed, "{ not json").unwrap();
        assert!(matches!(
            Config::from_file(&malformed),
            Err(Error::InvalidFormat { .. })
        ));
    }
}
