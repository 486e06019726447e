//! Error types reported by stage adapters
//!
//! Adapters only report *what* went wrong. Whether an error is worth
//! retrying is decided by the retry policy the orchestrator applies, which by
//! default uses [`Error::is_transient`].

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by external providers and adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// HTTP 429 / quota exhausted
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// HTTP 5xx / model overloaded
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Connection-level failure (DNS, reset, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered successfully but with no usable content
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// HTTP 400 / malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP 401/403 / invalid API key
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Input the provider cannot handle (bad audio, unsupported format)
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// Response could not be parsed or failed validation
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller went away; the run was abandoned
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Classify a non-success HTTP response.
    ///
    /// The body is kept for logs only; it never reaches end users.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => Self::RateLimited(body),
            401 | 403 => Self::Auth(body),
            408 => Self::Timeout(0),
            413 | 415 | 422 => Self::UnsupportedInput(body),
            500..=599 => Self::Unavailable(format!("{}: {}", status, body)),
            _ => Self::InvalidRequest(format!("{}: {}", status, body)),
        }
    }

    /// Default retry classification: rate limits, 5xx, timeouts, network
    /// failures and empty answers are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_)
                | Self::Unavailable(_)
                | Self::Timeout(_)
                | Self::Network(_)
                | Self::EmptyResponse(_)
        )
    }

    /// Short, stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
            Self::EmptyResponse(_) => "empty_response",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Auth(_) => "auth",
            Self::UnsupportedInput(_) => "unsupported_input",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable description that is safe to show to a farmer or API
    /// caller. Provider payloads are deliberately left out.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "The service is receiving too many requests. Please try again later.",
            Self::Unavailable(_) => "The service is temporarily overloaded. Please try again in a few minutes.",
            Self::Timeout(_) => "The service took too long to respond. Please try again.",
            Self::Network(_) => "Could not reach the service. Please try again.",
            Self::EmptyResponse(_) => "The service returned an empty answer.",
            Self::InvalidRequest(_) => "The request could not be processed.",
            Self::Auth(_) => "The service is not configured correctly.",
            Self::UnsupportedInput(_) => "The audio could not be processed.",
            Self::InvalidResponse(_) => "The service returned an unexpected answer.",
            Self::Config(_) => "The service is not configured correctly.",
            Self::Cancelled => "The request was cancelled.",
        }
    }
}

/// Clip a provider body to `max_chars` characters for logging
pub fn truncate_body(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("किसान", 2), "कि");
        assert_eq!(truncate_body("नमस्ते", 2), "नम");
        assert_eq!(truncate_body("ok", 10), "ok");
    }

    #[test]
    fn test_from_status() {
        assert_eq!(Error::from_status(429, "quota"), Error::RateLimited("quota".into()));
        assert!(matches!(Error::from_status(503, "x"), Error::Unavailable(_)));
        assert!(matches!(Error::from_status(401, "x"), Error::Auth(_)));
        assert!(matches!(Error::from_status(400, "x"), Error::InvalidRequest(_)));
        assert!(matches!(Error::from_status(415, "x"), Error::UnsupportedInput(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::RateLimited(String::new()).is_transient());
        assert!(Error::Unavailable(String::new()).is_transient());
        assert!(Error::Timeout(100).is_transient());
        assert!(Error::EmptyResponse(String::new()).is_transient());
        assert!(!Error::InvalidRequest(String::new()).is_transient());
        assert!(!Error::Auth(String::new()).is_transient());
        assert!(!Error::Cancelled.is_transient());
    }

    #[test]
    fn test_public_message_hides_payload() {
        let err = Error::Auth("API_KEY_INVALID sk-secret".into());
        assert!(!err.public_message().contains("sk-secret"));
    }
}
