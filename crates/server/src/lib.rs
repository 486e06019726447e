//! Kisan Voice Server
//!
//! HTTP API and Telegram webhook in front of the voice pipeline.

pub mod auth;
pub mod http;
pub mod metrics;
pub mod providers;
pub mod state;
pub mod telegram;

pub use auth::auth_middleware;
pub use http::create_router;
pub use metrics::{init_metrics, MetricsObserver};
pub use providers::build_orchestrator;
pub use state::AppState;
pub use telegram::{TelegramBot, TelegramClient, TelegramError};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use kisan_voice_pipeline::{ErrorCategory, PipelineError};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload too large")]
    PayloadTooLarge,

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// HTTP status for a failed run
///
/// Caller mistakes map to 4xx, provider trouble to 502/503.
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::UnsupportedLanguage => StatusCode::BAD_REQUEST,
        ErrorCategory::EmptyTranscript => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::TerminalUpstream => StatusCode::BAD_GATEWAY,
        ErrorCategory::RetryableUpstream => StatusCode::SERVICE_UNAVAILABLE,
        // Nobody is listening any more; nginx's "client closed request"
        ErrorCategory::CancelledByCaller => {
            StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Pipeline(e) => status_for(e.category),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Auth(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Pipeline(e) => e.category.as_str(),
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // Provider detail stays in the logs
            Self::Pipeline(e) => serde_json::json!({
                "error": {
                    "stage": e.stage.as_str(),
                    "category": e.category.as_str(),
                    "message": e.message,
                    "correlation_id": e.correlation_id,
                }
            }),
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Internal server error");
                serde_json::json!({
                    "error": { "category": self.kind(), "message": "Internal server error" }
                })
            }
            other => serde_json::json!({
                "error": { "category": other.kind(), "message": other.to_string() }
            }),
        };
        (status, Json(body)).into_response()
    }
}
