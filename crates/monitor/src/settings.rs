//! Layered service settings
//!
//! Defaults, then an optional TOML file, then `MONITOR__SECTION__KEY`
//! environment variables.

use alerting::AlertConfig;
use config::{Config, ConfigError, Environment, File, Source};
use dms::DetectionConfig;
use sample_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use telemetry::TelemetryConfig;
use thiserror::Error;
use tracing::Level;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "monitor";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MONITOR";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// HTTP status server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of plain text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detection: DetectionConfig,
    pub scheduler: SchedulerConfig,
    pub alert: AlertConfig,
    pub telemetry: TelemetryConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

impl Settings {
    /// Load from `path` (required) or `monitor.toml` (optional), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);
        match path {
            Some(path) => Self::from_sources(File::from(path).required(true), env),
            None => Self::from_sources(File::with_name(DEFAULT_CONFIG_FILE).required(false), env),
        }
    }

    fn from_sources<F>(file: F, env: Environment) -> Result<Self, SettingsError>
    where
        F: Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.detection
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        self.scheduler
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        self.log
            .level
            .parse::<Level>()
            .map_err(|_| SettingsError::Invalid(format!("Unknown log level: {}", self.log.level)))?;
        Ok(())
    }
}
