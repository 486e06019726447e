//! Gemini integration for the voice pipeline
//!
//! Features:
//! - REST `generateContent` client with text and inline-audio parts
//! - Multimodal transcription with language detection
//! - Agricultural advisor answering in the farmer's language
//! - Romanizer that makes non-Devanagari advice pronounceable for TTS

pub mod advisor;
pub mod client;
pub mod prompt;
pub mod romanizer;
pub mod transcriber;

pub use advisor::GeminiAdvisor;
pub use client::{GeminiClient, GenerativeBackend};
pub use prompt::{GenerationRequest, Part};
pub use romanizer::GeminiRomanizer;
pub use transcriber::GeminiTranscriber;

use kisan_voice_core::Error;
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    /// Non-success HTTP status with the provider's error body
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        /// `error.status` from the Gemini error body, e.g. `RESOURCE_EXHAUSTED`
        code: Option<String>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model answered without any text (blocked or empty candidate)
    #[error("Empty response: {0}")]
    Empty(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Api {
                status,
                code,
                message,
            } => classify_api_error(status, code.as_deref(), message),
            LlmError::Network(msg) => Error::Network(msg),
            LlmError::InvalidResponse(msg) => Error::InvalidResponse(msg),
            LlmError::Empty(msg) => Error::EmptyResponse(msg),
            LlmError::Timeout(ms) => Error::Timeout(ms),
            LlmError::Configuration(msg) => Error::Config(msg),
        }
    }
}

/// Gemini reports quota, overload and bad keys with specific status codes
/// that do not always line up with the HTTP status (an invalid key is a 400).
fn classify_api_error(status: u16, code: Option<&str>, message: String) -> Error {
    let lower = message.to_lowercase();
    match code {
        Some("RESOURCE_EXHAUSTED") => return Error::RateLimited(message),
        Some("UNAVAILABLE") | Some("INTERNAL") => return Error::Unavailable(message),
        Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED") => return Error::Auth(message),
        _ => {}
    }
    if lower.contains("quota") {
        Error::RateLimited(message)
    } else if lower.contains("overloaded") {
        Error::Unavailable(message)
    } else if lower.contains("api key") || lower.contains("api_key") {
        Error::Auth(message)
    } else {
        Error::from_status(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: Option<&str>, message: &str) -> Error {
        LlmError::Api {
            status,
            code: code.map(String::from),
            message: message.to_string(),
        }
        .into()
    }

    #[test]
    fn test_quota_is_rate_limited() {
        assert!(matches!(
            api(429, Some("RESOURCE_EXHAUSTED"), "Quota exceeded"),
            Error::RateLimited(_)
        ));
        assert!(matches!(api(400, None, "daily quota reached"), Error::RateLimited(_)));
    }

    #[test]
    fn test_overload_is_unavailable() {
        let err = api(503, Some("UNAVAILABLE"), "The model is overloaded");
        assert!(matches!(err, Error::Unavailable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_invalid_key_is_terminal() {
        let err = api(
            400,
            Some("INVALID_ARGUMENT"),
            "API key not valid. Please pass a valid API key.",
        );
        assert!(matches!(err, Error::Auth(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_plain_bad_request() {
        let err = api(400, Some("INVALID_ARGUMENT"), "Unsupported MIME type");
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_empty_is_transient() {
        let err: Error = LlmError::Empty("no candidates".into()).into();
        assert!(err.is_transient());
    }
}
