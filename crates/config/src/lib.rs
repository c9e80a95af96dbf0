//! Configuration management for the robot conversation front-end
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, `config/{env}.yaml`)
//! - Environment variables (`ROBOT_CHAT__` prefix, `__` separator)
//!
//! Every field has a default, so an empty configuration directory yields a
//! runnable setup pointed at local speech and motion services.

pub mod constants;
pub mod prompts;
pub mod settings;

pub use prompts::PromptsConfig;
pub use settings::{
    load_settings, load_settings_from, DispatchMode, DispatcherConfig, EngagementConfig,
    LlmSettings, MotionConfig, MotionSpec, ObservabilityConfig, ServerConfig, Settings,
    VoiceConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
