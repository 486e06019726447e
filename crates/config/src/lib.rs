//! Configuration management for the farmer voice assistant
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (`KISAN_VOICE__` prefix, `__` separator)
//! - The provider variable names used by existing deployments
//!   (`GOOGLE_API_KEY`, `ELEVEN_LABS_API_KEY`, `TELEGRAM_BOT_TOKEN`, ...)

pub mod pipeline;
pub mod providers;
pub mod settings;

pub use pipeline::{PipelineConfig, RetryConfig, StageRetryConfig};
pub use providers::{
    AzureSpeechConfig, ElevenLabsConfig, GeminiConfig, ProvidersConfig, SttProvider,
    TtsProvider, WhisperConfig,
};
pub use settings::{
    load_settings, AuthConfig, ObservabilityConfig, ServerConfig, Settings, TelegramConfig,
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

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for kisan_voice_core::Error {
    fn from(err: ConfigError) -> Self {
        kisan_voice_core::Error::Config(err.to_string())
    }
}
