//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homectl.toml` in the working directory, or at the path named by
//! `HOMECTL_CONFIG`. Every section has a default so the file is optional; a
//! missing file boots an empty hub. Environment variables take precedence
//! over file values.

use std::collections::BTreeMap;

use homectl_app::bus::DEFAULT_MAX_CALL_DEPTH;
use homectl_app::hub::HubConfig;
use homectl_domain::group::GroupConfig;
use homectl_domain::routine::RoutineConfig;
use homectl_domain::scene::SceneConfig;
use serde::Deserialize;

const DEFAULT_PATH: &str = "homectl.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Message bus settings.
    pub bus: BusConfig,
    /// Integration id to plugin settings, in declaration order.
    pub integrations: serde_json::Map<String, serde_json::Value>,
    pub groups: BTreeMap<String, GroupConfig>,
    pub scenes: BTreeMap<String, SceneConfig>,
    pub routines: BTreeMap<String, RoutineConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Message bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Nested calls allowed before a message chain is treated as a cycle.
    pub max_call_depth: usize,
}

impl Config {
    /// Load configuration from `HOMECTL_CONFIG` or `homectl.toml` (if
    /// present) then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HOMECTL_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path, "no config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or a section of the
    /// wrong shape.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMECTL_MAX_CALL_DEPTH") {
            if let Ok(depth) = val.parse() {
                self.bus.max_call_depth = depth;
            }
        }
        if let Ok(val) = std::env::var("HOMECTL_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.max_call_depth == 0 {
            return Err(ConfigError::Validation(
                "bus.max_call_depth must be non-zero".to_string(),
            ));
        }
        if let Some((id, _)) = self
            .integrations
            .iter()
            .find(|(_, settings)| !settings.is_object())
        {
            return Err(ConfigError::Validation(format!(
                "integrations.{id} must be a table"
            )));
        }
        Ok(())
    }

    /// The hub's share of the configuration.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_call_depth: self.bus.max_call_depth,
            integrations: self.integrations.clone(),
            groups: self.groups.clone(),
            scenes: self.scenes.clone(),
            routines: self.routines.clone(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homectld=info,homectl_app=info,homectl_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
