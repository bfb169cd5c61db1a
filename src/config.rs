//! Sync layer configuration
//!
//! Loaded from YAML (`SyncConfig::from_file`) or from environment variables
//! (`SyncConfig::from_env`, which also reads a `.env` file when present).
//! Every field has a default, so an empty file is a valid config.

use std::path::Path;
use std::time::Duration;

use board_client::HttpStoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable overriding `remote.base_url`
pub const BASE_URL_ENV: &str = "BOARD_BASE_URL";
/// Environment variable overriding `remote.timeout_secs`
pub const TIMEOUT_ENV: &str = "BOARD_TIMEOUT_SECS";
/// Environment variable overriding `display.date_format`
pub const DATE_FORMAT_ENV: &str = "BOARD_DATE_FORMAT";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub remote: RemoteConfig,
    pub display: DisplayConfig,
    pub cache: CacheConfig,
}

/// Remote table store connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Name of the environment variable holding the project API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key_env: "BOARD_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Derived display fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// `chrono` format string for due dates
    pub date_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_format: "%b %-d, %Y".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Refetch subscribed queries when they are invalidated
    pub background_refetch: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            background_refetch: true,
        }
    }
}

impl SyncConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.check()?;
        tracing::info!(path = %path.display(), base_url = %config.remote.base_url, "Configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Defaults overridden by `BOARD_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config.remote.base_url = url;
        }
        if let Ok(secs) = std::env::var(TIMEOUT_ENV) {
            config.remote.timeout_secs =
                secs.parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidValue {
                        name: TIMEOUT_ENV,
                        message: e.to_string(),
                    }
                })?;
        }
        if let Ok(format) = std::env::var(DATE_FORMAT_ENV) {
            config.display.date_format = format;
        }
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("remote.base_url"));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "remote.timeout_secs",
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// HTTP store settings, reading the API key from its environment variable.
    pub fn to_store_config(&self) -> HttpStoreConfig {
        HttpStoreConfig {
            base_url: self.remote.base_url.clone(),
            api_key: std::env::var(&self.remote.api_key_env).ok(),
            timeout: Duration::from_secs(self.remote.timeout_secs),
        }
    }
}
