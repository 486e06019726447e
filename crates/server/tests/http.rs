//! Router tests: request shapes, response headers and error mapping
//!
//! The orchestrator runs on mock adapters with no retries, so every request
//! resolves immediately and without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use tower::ServiceExt;

use kisan_voice_config::{Settings, TelegramConfig};
use kisan_voice_core::{
    Advisor, Advisory, AudioPayload, Error, Language, Result, SpeechToText, SynthesizedAudio,
    TextToSpeech, Transcript, VoiceGender, VoiceIdentity,
};
use kisan_voice_pipeline::{
    LanguageRouter, PipelineOrchestrator, PipelineVariant, RetryPolicy, StagePolicies,
};
use kisan_voice_server::{create_router, AppState, TelegramBot};

const BOUNDARY: &str = "kisan-test-boundary";

struct FixedStt(Result<Transcript>);

#[async_trait]
impl SpeechToText for FixedStt {
    async fn transcribe(&self, _audio: &AudioPayload, hint: Option<&str>) -> Result<Transcript> {
        self.0.clone().map(|t| match hint {
            Some(lang) => Transcript::new(t.text, lang),
            None => t,
        })
    }
    fn supported_languages(&self) -> &[Language] {
        Language::all()
    }
    fn model_name(&self) -> &str {
        "mock-stt"
    }
}

struct FixedAdvisor(Result<String>);

#[async_trait]
impl Advisor for FixedAdvisor {
    async fn advise(&self, _query: &str, language: &str) -> Result<Advisory> {
        self.0.clone().map(|text| Advisory::new(text, language))
    }
    fn model_name(&self) -> &str {
        "mock-advisor"
    }
}

struct CountingTts {
    result: Result<Vec<u8>>,
    calls: AtomicUsize,
}

#[async_trait]
impl TextToSpeech for CountingTts {
    async fn synthesize(&self, _text: &str, voice: &VoiceIdentity) -> Result<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map(|bytes| SynthesizedAudio {
            bytes,
            mime_type: "audio/mpeg".to_string(),
            voice_id: voice.name.clone(),
        })
    }
    fn model_name(&self) -> &str {
        "mock-tts"
    }
}

struct App {
    settings: Settings,
    stt: Result<Transcript>,
    advisor: Result<String>,
    tts: Arc<CountingTts>,
    telegram: bool,
}

impl App {
    fn new() -> Self {
        Self {
            settings: Settings::default(),
            stt: Ok(Transcript::new("गेहूं में पीला रतुआ लग गया है", "hi")),
            advisor: Ok("Propiconazole 25 EC ka spray karein".to_string()),
            tts: Arc::new(CountingTts {
                result: Ok(vec![0xFF, 0xFB, 0x90, 0x00]),
                calls: AtomicUsize::new(0),
            }),
            telegram: false,
        }
    }

    fn stt(mut self, result: Result<Transcript>) -> Self {
        self.stt = result;
        self
    }

    fn tts(mut self, result: Result<Vec<u8>>) -> Self {
        self.tts = Arc::new(CountingTts {
            result,
            calls: AtomicUsize::new(0),
        });
        self
    }

    fn api_key(mut self, key: &str) -> Self {
        self.settings.server.auth.enabled = true;
        self.settings.server.auth.api_key = Some(key.to_string());
        self
    }

    fn cors_origins(mut self, origins: &[&str]) -> Self {
        self.settings.server.cors_origins = origins.iter().map(|o| o.to_string()).collect();
        self
    }

    fn telegram(mut self, secret: Option<&str>) -> Self {
        self.telegram = true;
        self.settings.telegram = TelegramConfig {
            enabled: true,
            bot_token: Some("123:test".to_string()),
            // Nothing listens here; spawned processing fails fast
            api_base: "http://127.0.0.1:9".to_string(),
            secret_token: secret.map(str::to_string),
            ..TelegramConfig::default()
        };
        self
    }

    fn router(&self) -> Router {
        let orchestrator = PipelineOrchestrator::builder()
            .stt(Arc::new(FixedStt(self.stt.clone())))
            .advisor(Arc::new(FixedAdvisor(self.advisor.clone())))
            .tts(self.tts.clone())
            .router(LanguageRouter::new(VoiceGender::Female))
            .variant(PipelineVariant { optimize: false })
            .policies(StagePolicies::uniform(RetryPolicy::no_retry(Duration::from_secs(5))))
            .build()
            .unwrap();

        let mut state = AppState::new(self.settings.clone(), orchestrator);
        if self.telegram {
            state = state.with_telegram(TelegramBot::new(&self.settings.telegram).unwrap());
        }
        create_router(state)
    }
}

fn multipart_body(audio: Option<&[u8]>, language: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(bytes) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"query.ogg\"\r\nContent-Type: audio/ogg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(lang) = language {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\n{lang}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn voice_request(uri: &str, audio: Option<&[u8]>, language: Option<&str>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(audio, language)))
        .unwrap()
}

fn form_request(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn webhook_request(payload: &str, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhook/telegram")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header("X-Telegram-Bot-Api-Secret-Token", secret);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = App::new()
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_ready_lists_stage_models() {
    let response = App::new()
        .router()
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["stages"]["transcribe"], "mock-stt");
    assert_eq!(body["stages"]["synthesize"], "mock-tts");
    assert!(body["stages"].get("optimize").is_none());
    assert_eq!(body["telegram"], false);
}

#[tokio::test]
async fn test_process_voice_returns_audio_with_headers() {
    let response = App::new()
        .router()
        .oneshot(voice_request("/api/v2/process-voice", Some(b"OggS-audio"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), "audio/mpeg");
    assert_eq!(header_str(&response, "x-language"), "hi");
    assert_eq!(header_str(&response, "x-fallback"), "false");
    assert_eq!(
        urlencoding::decode(header_str(&response, "x-transcription")).unwrap(),
        "गेहूं में पीला रतुआ लग गया है"
    );
    assert_eq!(
        urlencoding::decode(header_str(&response, "x-tts-text")).unwrap(),
        "Propiconazole 25 EC ka spray karein"
    );
    let id = header_str(&response, "x-correlation-id").to_string();
    assert!(header_str(&response, "content-disposition").contains(&format!("response_{}.mp3", id)));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], &[0xFF, 0xFB, 0x90, 0x00]);
}

#[tokio::test]
async fn test_punjabi_substitution_sets_fallback_header() {
    let response = App::new()
        .router()
        .oneshot(voice_request("/api/v2/process-voice", Some(b"OggS-audio"), Some("pa")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-language"), "pa");
    assert_eq!(header_str(&response, "x-fallback"), "true");
}

#[tokio::test]
async fn test_missing_audio_is_bad_request() {
    let response = App::new()
        .router()
        .oneshot(voice_request("/api/v2/process-voice", None, Some("hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["category"], "invalid_request");
}

#[tokio::test]
async fn test_empty_audio_is_bad_request() {
    let response = App::new()
        .router()
        .oneshot(voice_request("/api/v2/process-voice", Some(b""), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_language_never_synthesizes() {
    let app = App::new();
    let response = app
        .router()
        .oneshot(voice_request("/api/v2/process-voice", Some(b"OggS-audio"), Some("sd")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["category"], "unsupported_language");
    assert_eq!(body["error"]["stage"], "synthesize");
    assert!(body["error"]["correlation_id"].is_string());
    assert_eq!(app.tts.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_transcript_is_unprocessable() {
    let response = App::new()
        .stt(Ok(Transcript::new("   ", "hi")))
        .router()
        .oneshot(voice_request("/api/v2/process-voice", Some(b"OggS-audio"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["error"]["category"], "empty_transcript");
}

#[tokio::test]
async fn test_terminal_failure_is_bad_gateway_without_provider_detail() {
    let response = App::new()
        .stt(Err(Error::Auth("401: key sk-live-123 revoked".to_string())))
        .router()
        .oneshot(voice_request("/api/v2/process-voice", Some(b"OggS-audio"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"]["stage"], "transcribe");
    assert!(!body.to_string().contains("sk-live-123"));
}

#[tokio::test]
async fn test_exhausted_retries_are_service_unavailable() {
    let response = App::new()
        .tts(Err(Error::Unavailable("503 busy".to_string())))
        .router()
        .oneshot(voice_request("/api/v2/process-voice", Some(b"OggS-audio"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"]["category"], "retryable_upstream");
}

#[tokio::test]
async fn test_api_key_required_when_enabled() {
    let router = App::new().api_key("farm-key").router();

    let denied = router
        .clone()
        .oneshot(voice_request("/api/v2/process-voice", Some(b"OggS-audio"), None))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let mut request = voice_request("/api/v2/process-voice", Some(b"OggS-audio"), None);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer farm-key".parse().unwrap());
    let allowed = router.clone().oneshot(request).await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    // Health stays public
    let health = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_transcribe_endpoint() {
    let response = App::new()
        .router()
        .oneshot(voice_request("/api/v2/test-transcribe", Some(b"OggS-audio"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["transcription"], "गेहूं में पीला रतुआ लग गया है");
    assert_eq!(body["language"], "hi");
}

#[tokio::test]
async fn test_advise_endpoint_defaults_to_hindi() {
    let response = App::new()
        .router()
        .oneshot(form_request("/api/v2/test-advise", "query=wheat+rust"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["language"], "hi");
    assert_eq!(body["response"], "Propiconazole 25 EC ka spray karein");
}

#[tokio::test]
async fn test_synthesize_endpoint() {
    let app = App::new();
    let response = app
        .router()
        .oneshot(form_request("/api/v2/test-synthesize", "text=namaste&language=ta"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-language"), "ta");
    assert_eq!(header_str(&response, "x-fallback"), "false");
    assert_eq!(app.tts.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_webhook_disabled_is_not_found() {
    let response = App::new()
        .router()
        .oneshot(webhook_request(r#"{"update_id":1}"#, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_ignores_non_message_updates() {
    let response = App::new()
        .telegram(None)
        .router()
        .oneshot(webhook_request(r#"{"update_id":7,"edited_message":{}}"#, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ignored");
}

#[tokio::test]
async fn test_webhook_invalid_json_still_acknowledged() {
    let response = App::new()
        .telegram(None)
        .router()
        .oneshot(webhook_request("not json", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "error");
}

#[tokio::test]
async fn test_webhook_drops_duplicate_updates() {
    let router = App::new().telegram(None).router();
    let payload = r#"{"update_id":42,"message":{"message_id":1,"chat":{"id":99},"text":"hello"}}"#;

    let first = router.clone().oneshot(webhook_request(payload, None)).await.unwrap();
    assert_eq!(json_body(first).await["status"], "ok");

    let second = router.oneshot(webhook_request(payload, None)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(json_body(second).await["status"], "duplicate");
}

#[tokio::test]
async fn test_webhook_checks_secret_token() {
    let router = App::new().telegram(Some("hook-secret")).router();
    let payload = r#"{"update_id":5}"#;

    let denied = router
        .clone()
        .oneshot(webhook_request(payload, Some("wrong")))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let accepted = router
        .oneshot(webhook_request(payload, Some("hook-secret")))
        .await
        .unwrap();
    assert_eq!(json_body(accepted).await["status"], "ignored");
}

#[tokio::test]
async fn test_cors_preflight_answered_for_default_origin() {
    let response = App::new()
        .router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v2/process-voice")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "access-control-allow-origin"),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_cors_exposes_pipeline_headers_to_configured_origin() {
    let mut request = voice_request("/api/v2/process-voice", Some(b"OggS-audio"), None);
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://kisan.example".parse().unwrap());

    let response = App::new()
        .cors_origins(&["https://kisan.example"])
        .router()
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "access-control-allow-origin"),
        "https://kisan.example"
    );
    let exposed = header_str(&response, "access-control-expose-headers").to_ascii_lowercase();
    assert!(exposed.contains("x-transcription"));
    assert!(exposed.contains("x-correlation-id"));
}
