//! Authentication Middleware
//!
//! Bearer API key check for the `/api/v2` routes.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::{OriginalUri, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use kisan_voice_config::AuthConfig;

use crate::state::AppState;
use crate::ServerError;

static AUTH_DISABLED_WARNED: AtomicBool = AtomicBool::new(false);

enum AuthCheck {
    Disabled,
    PublicPath,
    ConfigError(&'static str),
    CheckKey(String),
}

fn check_auth_config(auth: &AuthConfig, path: &str) -> AuthCheck {
    if !auth.enabled {
        if !AUTH_DISABLED_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "API authentication is disabled. Set KISAN_VOICE__SERVER__AUTH__ENABLED=true for production."
            );
        }
        return AuthCheck::Disabled;
    }

    if auth.public_paths.iter().any(|p| path == p) {
        return AuthCheck::PublicPath;
    }

    match &auth.api_key {
        Some(key) if !key.is_empty() => AuthCheck::CheckKey(key.clone()),
        _ => AuthCheck::ConfigError("Auth is enabled but no API key is configured"),
    }
}

/// Require `Authorization: Bearer <api_key>` when auth is enabled
///
/// Set the key via `KISAN_VOICE__SERVER__AUTH__API_KEY`.
pub async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    // Nested routers see a stripped path
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    match check_auth_config(&state.config.server.auth, &path) {
        AuthCheck::Disabled | AuthCheck::PublicPath => next.run(request).await,
        AuthCheck::ConfigError(msg) => {
            ServerError::Internal(msg.to_string()).into_response()
        }
        AuthCheck::CheckKey(expected_key) => {
            let provided = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            match provided.as_deref().map(|h| h.strip_prefix("Bearer ")) {
                Some(Some(key)) if constant_time_compare(key.as_bytes(), expected_key.as_bytes()) => {
                    next.run(request).await
                }
                Some(Some(_)) => {
                    tracing::warn!(
                        path = %path,
                        forwarded_for = ?request.headers().get("X-Forwarded-For"),
                        "Invalid API key"
                    );
                    ServerError::Auth("Invalid API key".to_string()).into_response()
                }
                Some(None) => ServerError::InvalidRequest(
                    "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
                )
                .into_response(),
                None => ServerError::Auth("Missing Authorization header".to_string()).into_response(),
            }
        }
    }
}

/// Constant-time comparison
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
