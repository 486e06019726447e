//! Shared helpers for the HTTP speech providers

use kisan_voice_core::error::truncate_body;
use kisan_voice_core::Error;

/// Map a transport-level reqwest failure
pub(crate) fn send_error(err: reqwest::Error, timeout_ms: u64) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout_ms)
    } else if err.is_decode() {
        Error::InvalidResponse(err.to_string())
    } else {
        Error::Network(err.to_string())
    }
}

/// Classify a non-success response, keeping a bounded body for logs
pub(crate) async fn status_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Error::from_status(status, truncate_body(&body, 300))
}

pub(crate) fn client(timeout_ms: u64) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}
