//! Configuration system
//!
//! Handles loading configuration from TOML files with environment variable
//! overrides. The backend table is handed verbatim to [`crate::store::open`].

use crate::source::SourceConfig;
use crate::store::{BackendConfig, StoreError, StoreResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,

    #[serde(default)]
    pub source: Option<SourceConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            StoreError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> StoreResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from the default locations
    pub fn load_default() -> StoreResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("almanac").join("config.toml")),
            Some(PathBuf::from("./almanac.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::info!(path = %path.display(), "loading config");
                return Self::load_with_env(path);
            }
        }

        Err(StoreError::Config(
            "no config file found; pass --config or create ./almanac.toml".to_string(),
        ))
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("ALMANAC_DATA_DIR") {
            self.backend.dir = Some(PathBuf::from(dir));
        }
        if let Ok(timezone) = std::env::var("ALMANAC_TIMEZONE") {
            self.backend.timezone = timezone;
        }
        if let Ok(level) = std::env::var("ALMANAC_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}
