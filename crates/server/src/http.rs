//! HTTP Endpoints
//!
//! Voice API for the farmer advisory pipeline.

use std::time::Duration;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Form, Multipart, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use kisan_voice_core::{AudioFormat, AudioPayload, SynthesizedAudio, VoiceRequest};
use kisan_voice_pipeline::{CancellationToken, PipelineResult};

use crate::auth::auth_middleware;
use crate::metrics::{self, metrics_handler};
use crate::state::AppState;
use crate::telegram::webhook_handler;
use crate::ServerError;

/// Header values are clipped to this many characters before encoding
const HEADER_PREVIEW_CHARS: usize = 200;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout = request_timeout(server.timeout_seconds, state.orchestrator.worst_case_duration());

    let api = Router::new()
        .route("/process-voice", post(process_voice))
        .route("/test-transcribe", post(test_transcribe))
        .route("/test-advise", post(test_advise))
        .route("/test-synthesize", post(test_synthesize))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v2", api)
        .route("/api/webhook/telegram", post(webhook_handler))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Request timeout that never cuts a run short of its retry budget
fn request_timeout(configured_secs: u64, pipeline_budget: Duration) -> Duration {
    let configured = Duration::from_secs(configured_secs);
    if configured >= pipeline_budget {
        return configured;
    }
    tracing::warn!(
        configured_secs,
        budget_secs = pipeline_budget.as_secs(),
        "server.timeout_seconds is below the pipeline retry budget, using the budget"
    );
    pipeline_budget
}

/// CORS layer from configured origins
///
/// Disabled CORS is permissive; an empty or fully invalid origin list
/// falls back to `http://localhost:3000`.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let localhost = || {
        CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        return localhost();
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static("x-transcription"),
            HeaderName::from_static("x-raw-response"),
            HeaderName::from_static("x-tts-text"),
            HeaderName::from_static("x-language"),
            HeaderName::from_static("x-correlation-id"),
            HeaderName::from_static("x-fallback"),
            HeaderName::from_static("x-voice"),
        ])
}

/// Audio upload plus optional declared language
struct VoiceUpload {
    audio: AudioPayload,
    language: Option<String>,
}

fn multipart_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge
    } else {
        ServerError::InvalidRequest(err.body_text())
    }
}

/// Read the `audio` (or `file`) part and an optional `language` field
async fn read_upload(mut multipart: Multipart) -> Result<VoiceUpload, ServerError> {
    let mut audio = None;
    let mut language = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("audio") | Some("file") => {
                let format = AudioFormat::detect(field.content_type(), field.file_name());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                audio = Some(AudioPayload::new(bytes.to_vec(), format));
            }
            Some("language") => {
                language = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| ServerError::InvalidRequest("Missing audio file".to_string()))?;
    if audio.is_empty() {
        return Err(ServerError::InvalidRequest("Audio file is empty".to_string()));
    }
    Ok(VoiceUpload { audio, language })
}

/// Percent-encode the first 200 characters for use as a header value
fn preview_header(text: &str) -> HeaderValue {
    let clipped: String = text.chars().take(HEADER_PREVIEW_CHARS).collect();
    // Percent-encoding leaves only visible ASCII
    HeaderValue::from_str(&urlencoding::encode(&clipped)).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn plain_header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

fn audio_headers(audio: &SynthesizedAudio, correlation_id: &str) -> HeaderMap {
    let extension = AudioFormat::from_mime(&audio.mime_type)
        .unwrap_or(AudioFormat::Mp3)
        .extension();
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, plain_header(&audio.mime_type));
    headers.insert(
        header::CONTENT_DISPOSITION,
        plain_header(&format!("inline; filename=\"response_{}.{}\"", correlation_id, extension)),
    );
    headers.insert("x-correlation-id", plain_header(correlation_id));
    headers
}

fn voice_response(result: PipelineResult) -> Response {
    let mut headers = audio_headers(&result.audio, &result.correlation_id);
    headers.insert("x-transcription", preview_header(&result.transcript.text));
    headers.insert("x-raw-response", preview_header(&result.advisory.text));
    headers.insert("x-tts-text", preview_header(result.tts_text()));
    headers.insert("x-language", plain_header(&result.language));
    headers.insert(
        "x-fallback",
        HeaderValue::from_static(if result.fallback_occurred() { "true" } else { "false" }),
    );
    headers.insert("x-voice", plain_header(&result.voice.voice.name));

    (StatusCode::OK, headers, result.audio.bytes).into_response()
}

/// `POST /api/v2/process-voice`
///
/// Dropping this future (client disconnect, request timeout) cancels the run.
async fn process_voice(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ServerError> {
    metrics::record_request("process_voice");
    let upload = read_upload(multipart).await?;
    let request = VoiceRequest::new(upload.audio).with_language(upload.language);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.orchestrator.run_with_cancel(request, cancel).await {
        Ok(result) => {
            metrics::record_run(&result);
            Ok(voice_response(result))
        }
        Err(err) => {
            metrics::record_failure(&err);
            Err(err.into())
        }
    }
}

/// `POST /api/v2/test-transcribe`
async fn test_transcribe(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ServerError> {
    metrics::record_request("test_transcribe");
    let upload = read_upload(multipart).await?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let transcript = state
        .orchestrator
        .transcribe_only(&upload.audio, upload.language.as_deref(), &cancel)
        .await?;

    Ok(Json(serde_json::json!({
        "transcription": transcript.text,
        "language": transcript.language,
        "confidence": transcript.confidence,
    }))
    .into_response())
}

fn default_language() -> String {
    "hi".to_string()
}

#[derive(Debug, Deserialize)]
struct AdviseForm {
    query: String,
    #[serde(default = "default_language")]
    language: String,
}

/// `POST /api/v2/test-advise`
async fn test_advise(State(state): State<AppState>, Form(form): Form<AdviseForm>) -> Result<Response, ServerError> {
    metrics::record_request("test_advise");
    if form.query.trim().is_empty() {
        return Err(ServerError::InvalidRequest("query must not be empty".to_string()));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let advisory = state
        .orchestrator
        .advise_only(&form.query, &form.language, &cancel)
        .await?;

    Ok(Json(serde_json::json!({
        "query": form.query,
        "language": form.language,
        "response": advisory.text,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct SynthesizeForm {
    text: String,
    #[serde(default = "default_language")]
    language: String,
}

/// `POST /api/v2/test-synthesize`
async fn test_synthesize(
    State(state): State<AppState>,
    Form(form): Form<SynthesizeForm>,
) -> Result<Response, ServerError> {
    metrics::record_request("test_synthesize");
    if form.text.trim().is_empty() {
        return Err(ServerError::InvalidRequest("text must not be empty".to_string()));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let (audio, voice) = state
        .orchestrator
        .synthesize_only(&form.text, &form.language, &cancel)
        .await?;

    let id = uuid::Uuid::new_v4().to_string();
    let mut headers = audio_headers(&audio, &id);
    headers.insert("x-language", plain_header(&form.language));
    headers.insert("x-voice", plain_header(&voice.voice.name));
    headers.insert(
        "x-fallback",
        HeaderValue::from_static(if voice.substituted { "true" } else { "false" }),
    );
    Ok((StatusCode::OK, headers, audio.bytes).into_response())
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "kisan-voice",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/v2/process-voice",
            "/api/v2/test-transcribe",
            "/api/v2/test-advise",
            "/api/v2/test-synthesize",
            "/api/webhook/telegram",
        ],
    }))
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check: configured models per stage and routed languages
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let stages: serde_json::Map<String, serde_json::Value> = state
        .orchestrator
        .stage_models()
        .into_iter()
        .map(|(stage, model)| (stage.as_str().to_string(), model.into()))
        .collect();
    let languages: Vec<&str> = state
        .orchestrator
        .router()
        .routed_languages()
        .iter()
        .map(|l| l.code())
        .collect();

    Json(serde_json::json!({
        "status": "ready",
        "stages": stages,
        "languages": languages,
        "telegram": state.telegram.is_some(),
    }))
}
