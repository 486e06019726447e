//! Upstream provider configuration
//!
//! One transcriber and one synthesizer are chosen at startup. The advisor and
//! the romanizer always run on Gemini.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which speech-to-text backend transcribes incoming audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    /// Multimodal Gemini with language detection
    #[default]
    Gemini,
    /// OpenAI-compatible `/audio/transcriptions` endpoint
    Whisper,
}

/// Which text-to-speech backend speaks the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    /// ElevenLabs multilingual model with a single configured voice
    #[default]
    #[serde(alias = "eleven_labs")]
    ElevenLabs,
    /// Azure Speech neural voices picked by the language router
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub stt: SttProvider,

    #[serde(default)]
    pub tts: TtsProvider,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub whisper: WhisperConfig,

    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,

    #[serde(default)]
    pub azure: AzureSpeechConfig,
}

impl ProvidersConfig {
    /// Check that every selected provider has credentials
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Gemini backs the advisor regardless of the STT choice
        require_key("providers.gemini.api_key", &self.gemini.api_key)?;

        if self.stt == SttProvider::Whisper {
            require_key("providers.whisper.api_key", &self.whisper.api_key)?;
        }

        match self.tts {
            TtsProvider::ElevenLabs => {
                require_key("providers.elevenlabs.api_key", &self.elevenlabs.api_key)?;
            }
            TtsProvider::Azure => {
                require_key("providers.azure.api_key", &self.azure.api_key)?;
                if self.azure.region.trim().is_empty() {
                    return Err(ConfigError::MissingField("providers.azure.region".to_string()));
                }
            }
        }
        Ok(())
    }
}

fn require_key(field: &str, key: &Option<String>) -> Result<(), ConfigError> {
    match key {
        Some(k) if !k.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::MissingField(field.to_string())),
    }
}

/// Gemini REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (`GOOGLE_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model used for transcription, advice and romanization
    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Client-level request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    512
}

fn default_request_timeout_ms() -> u64 {
    90_000
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// OpenAI-compatible transcription endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// API key (`OPENAI_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_whisper_base_url")]
    pub base_url: String,

    #[serde(default = "default_whisper_model")]
    pub model: String,

    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_whisper_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_whisper_base_url(),
            model: default_whisper_model(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// ElevenLabs text-to-speech
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    /// API key (`ELEVEN_LABS_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,

    #[serde(default = "default_elevenlabs_model")]
    pub model: String,

    /// Voice used for every language (`ELEVEN_LABS_INDIAN_VOICE_ID`)
    #[serde(default = "default_elevenlabs_voice")]
    pub voice_id: String,

    /// Set when `voice_id` came from configuration rather than the default
    #[serde(skip)]
    pub voice_id_overridden: bool,

    #[serde(default = "default_output_format")]
    pub output_format: String,

    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_elevenlabs_model() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_elevenlabs_voice() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_output_format() -> String {
    "mp3_44100_128".to_string()
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_elevenlabs_base_url(),
            model: default_elevenlabs_model(),
            voice_id: default_elevenlabs_voice(),
            voice_id_overridden: false,
            output_format: default_output_format(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Azure Speech neural TTS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureSpeechConfig {
    /// Subscription key (`AZURE_SPEECH_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Region, e.g. `centralindia` (`AZURE_SPEECH_REGION`)
    #[serde(default = "default_azure_region")]
    pub region: String,

    /// Overrides the regional endpoint when set
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_azure_output_format")]
    pub output_format: String,

    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_azure_region() -> String {
    "centralindia".to_string()
}

fn default_azure_output_format() -> String {
    "audio-24khz-48kbitrate-mono-mp3".to_string()
}

impl AzureSpeechConfig {
    /// Synthesis endpoint for the configured region
    pub fn synthesis_url(&self) -> String {
        match &self.endpoint {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            ),
        }
    }
}

impl Default for AzureSpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            region: default_azure_region(),
            endpoint: None,
            output_format: default_azure_output_format(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_keys() -> ProvidersConfig {
        let mut config = ProvidersConfig::default();
        config.gemini.api_key = Some("g".to_string());
        config.elevenlabs.api_key = Some("e".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = ProvidersConfig::default();
        assert_eq!(config.stt, SttProvider::Gemini);
        assert_eq!(config.tts, TtsProvider::ElevenLabs);
        assert_eq!(config.elevenlabs.voice_id, "JBFqnCBsd6RMkjVDRZzb");
        assert_eq!(config.elevenlabs.model, "eleven_multilingual_v2");
    }

    #[test]
    fn test_gemini_key_always_required() {
        let mut config = with_keys();
        assert!(config.validate().is_ok());
        config.gemini.api_key = Some("   ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_selected_provider_keys() {
        let mut config = with_keys();
        config.stt = SttProvider::Whisper;
        assert!(config.validate().is_err());
        config.whisper.api_key = Some("w".to_string());
        assert!(config.validate().is_ok());

        config.tts = TtsProvider::Azure;
        assert!(config.validate().is_err());
        config.azure.api_key = Some("a".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_azure_url() {
        let mut azure = AzureSpeechConfig::default();
        assert_eq!(
            azure.synthesis_url(),
            "https://centralindia.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        azure.endpoint = Some("http://localhost:9000/tts/".to_string());
        assert_eq!(azure.synthesis_url(), "http://localhost:9000/tts");
    }

    #[test]
    fn test_provider_names_deserialize() {
        let stt: SttProvider = serde_json::from_str("\"whisper\"").unwrap();
        assert_eq!(stt, SttProvider::Whisper);
        let tts: TtsProvider = serde_json::from_str("\"eleven_labs\"").unwrap();
        assert_eq!(tts, TtsProvider::ElevenLabs);
        let tts: TtsProvider = serde_json::from_str("\"elevenlabs\"").unwrap();
        assert_eq!(tts, TtsProvider::ElevenLabs);
    }
}
