use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application settings.
///
/// ```toml
/// [logging]
/// level = "debug"
///
/// [events]
/// channel_capacity = 2048
///
/// [pipeline]
/// slow_hook_warn_ms = 250
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.events.channel_capacity == 0 {
            return Err("events.channel_capacity must be > 0".into());
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate().map_err(ConfigError::Invalid)?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Buffer size of the application event broadcaster.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}
fn default_channel_capacity() -> usize {
    plume_core::events::broadcaster::DEFAULT_BUFFER_SIZE
}
impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Hooks running longer than this are logged. 0 turns the warning off.
    #[serde(default = "default_slow_hook_warn_ms")]
    pub slow_hook_warn_ms: u64,
}
fn default_slow_hook_warn_ms() -> u64 {
    1000
}
impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slow_hook_warn_ms: default_slow_hook_warn_ms(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default file looked up when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "plume.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        // Environment variable overrides, e.g., PLUME__EVENTS__CHANNEL_CAPACITY=4096
        builder = builder.add_source(
            Environment::with_prefix("PLUME")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Build(e.to_string()))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        merged.validate().map_err(ConfigError::Invalid)?;
        Ok(merged)
    }
}
