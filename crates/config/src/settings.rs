//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, PipelineConfig, ProvidersConfig};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Telegram webhook adapter
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.providers.validate()?;
        self.pipeline.validate()?;
        self.validate_telegram()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if server.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_upload_bytes".to_string(),
                message: "Upload limit must be positive".to_string(),
            });
        }

        if server.auth.enabled && server.auth.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "server.auth.api_key".to_string(),
                message: "API key must be set when auth is enabled".to_string(),
            });
        }

        Ok(())
    }

    fn validate_telegram(&self) -> Result<(), ConfigError> {
        let telegram = &self.telegram;
        if !telegram.enabled {
            return Ok(());
        }

        if telegram.bot_token.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("telegram.bot_token".to_string()));
        }

        if telegram.dedup_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "telegram.dedup_capacity".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Fill credentials from the variable names existing deployments use
    ///
    /// Values already set through files or `KISAN_VOICE__` variables win.
    /// A bot token switches the Telegram adapter on unless it was disabled
    /// explicitly.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        fill(&mut self.providers.gemini.api_key, get("GOOGLE_API_KEY"));
        fill(&mut self.providers.whisper.api_key, get("OPENAI_API_KEY"));
        fill(&mut self.providers.elevenlabs.api_key, get("ELEVEN_LABS_API_KEY"));
        fill(&mut self.providers.azure.api_key, get("AZURE_SPEECH_KEY"));

        if let Some(voice) = get("ELEVEN_LABS_INDIAN_VOICE_ID") {
            if !self.providers.elevenlabs.voice_id_overridden {
                self.providers.elevenlabs.voice_id = voice;
            }
        }
        if let Some(region) = get("AZURE_SPEECH_REGION") {
            self.providers.azure.region = region;
        }

        if self.telegram.bot_token.is_none() {
            if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
                self.telegram.bot_token = Some(token);
                if self.telegram.enabled_unset {
                    self.telegram.enabled = true;
                }
            }
        }
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Raised at startup to the pipeline's
    /// worst case (every stage exhausting its retry table) when lower.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty falls back to http://localhost:3000)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Largest accepted audio upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timeout() -> u64 {
    900
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_upload_bytes: default_max_upload_bytes(),
            auth: AuthConfig::default(),
        }
    }
}

/// Authentication configuration for `/api/v2/*`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Enable authentication (set to false for development)
    #[serde(default)]
    pub enabled: bool,

    /// Bearer key, normally set via `KISAN_VOICE__SERVER__AUTH__API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Paths that bypass authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/".to_string(),
        "/health".to_string(),
        "/ready".to_string(),
        "/metrics".to_string(),
        "/api/webhook/telegram".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            public_paths: default_public_paths(),
        }
    }
}

/// Telegram bot webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Set when `enabled` did not come from configuration; lets a legacy
    /// `TELEGRAM_BOT_TOKEN` switch the adapter on.
    #[serde(skip, default = "default_true")]
    pub enabled_unset: bool,

    /// Bot token (`TELEGRAM_BOT_TOKEN`)
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Expected `X-Telegram-Bot-Api-Secret-Token`; unchecked when unset
    #[serde(default)]
    pub secret_token: Option<String>,

    /// Number of recent `update_id`s remembered for duplicate delivery
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_dedup_capacity() -> usize {
    1024
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            enabled_unset: true,
            bot_token: None,
            api_base: default_telegram_api_base(),
            secret_token: None,
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus recorder and `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Directory for daily `runs_YYYYMMDD.jsonl` files; no run log when unset
    #[serde(default = "default_run_log_dir")]
    pub run_log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_run_log_dir() -> Option<String> {
    Some("logs".to_string())
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
            run_log_dir: default_run_log_dir(),
        }
    }
}

/// Load settings from files, `KISAN_VOICE__*` variables and legacy names
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("KISAN_VOICE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let explicit_telegram = config.get_bool("telegram.enabled").is_ok();
    let explicit_voice = config.get_string("providers.elevenlabs.voice_id").is_ok();

    let mut settings: Settings = config.try_deserialize()?;
    settings.telegram.enabled_unset = !explicit_telegram;
    settings.providers.elevenlabs.voice_id_overridden = explicit_voice;
    settings.apply_legacy_env(|name| std::env::var(name).ok());

    settings.validate()?;

    tracing::debug!(
        stt = ?settings.providers.stt,
        tts = ?settings.providers.tts,
        telegram = settings.telegram.enabled,
        "Settings loaded"
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> Settings {
        let mut settings = Settings::default();
        settings.providers.gemini.api_key = Some("g".to_string());
        settings.providers.elevenlabs.api_key = Some("e".to_string());
        settings
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert!(!settings.server.auth.enabled);
        assert!(!settings.telegram.enabled);
        assert!(settings.pipeline.optimize_enabled);
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = valid();
        assert!(settings.validate().is_ok());

        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let settings = Settings::default();
        assert!(matches!(settings.validate(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_auth_requires_key() {
        let mut settings = valid();
        settings.server.auth.enabled = true;
        assert!(settings.validate().is_err());
        settings.server.auth.api_key = Some("secret".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_legacy_env_fills_credentials() {
        let mut settings = Settings::default();
        settings.apply_legacy_env(env(&[
            ("GOOGLE_API_KEY", "google"),
            ("ELEVEN_LABS_API_KEY", "eleven"),
            ("ELEVEN_LABS_INDIAN_VOICE_ID", "voice-123"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ]));

        assert_eq!(settings.providers.gemini.api_key.as_deref(), Some("google"));
        assert_eq!(settings.providers.elevenlabs.voice_id, "voice-123");
        assert!(settings.telegram.enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_legacy_env_does_not_override_explicit() {
        let mut settings = valid();
        settings.telegram.enabled_unset = false;
        settings.providers.elevenlabs.voice_id = "configured".to_string();
        settings.providers.elevenlabs.voice_id_overridden = true;
        settings.apply_legacy_env(env(&[
            ("GOOGLE_API_KEY", "other"),
            ("ELEVEN_LABS_INDIAN_VOICE_ID", "legacy"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ]));

        assert_eq!(settings.providers.gemini.api_key.as_deref(), Some("g"));
        assert_eq!(settings.providers.elevenlabs.voice_id, "configured");
        assert!(!settings.telegram.enabled);
        assert_eq!(settings.telegram.bot_token.as_deref(), Some("123:abc"));
    }

    #[test]
    fn test_blank_legacy_values_ignored() {
        let mut settings = Settings::default();
        settings.apply_legacy_env(env(&[("GOOGLE_API_KEY", "  ")]));
        assert!(settings.providers.gemini.api_key.is_none());
    }

    #[test]
    fn test_telegram_validation() {
        let mut settings = valid();
        settings.telegram.enabled = true;
        assert!(settings.validate().is_err());
        settings.telegram.bot_token = Some("123:abc".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.yaml");
        std::fs::write(
            &path,
            "server:\n  port: 9100\npipeline:\n  optimize_enabled: false\nproviders:\n  tts: azure\n",
        )
        .unwrap();

        let config = Config::builder()
            .add_source(File::from(path))
            .build()
            .unwrap();
        let settings: Settings = config.try_deserialize().unwrap();

        assert_eq!(settings.server.port, 9100);
        assert!(!settings.pipeline.optimize_enabled);
        assert_eq!(settings.providers.tts, crate::TtsProvider::Azure);
        assert_eq!(settings.pipeline.retry.advise.max_attempts(), 4);
    }
}
