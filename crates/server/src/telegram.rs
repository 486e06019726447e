//! Telegram webhook adapter
//!
//! The webhook acknowledges every update immediately and processes voice
//! messages in a spawned task:
//!
//! ```text
//! update ─► dedup ─► getFile ─► download ─► orchestrator ─► sendVoice
//!                                                  └─(error)─► sendMessage (apology)
//! ```
//!
//! Telegram redelivers updates it did not get a 200 for, so duplicate
//! `update_id`s are dropped using a bounded window of recent ids.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use kisan_voice_config::TelegramConfig;
use kisan_voice_core::{AudioFormat, AudioPayload, SynthesizedAudio, VoiceRequest};
use kisan_voice_pipeline::{ErrorCategory, PipelineOrchestrator};

use crate::auth::constant_time_compare;
use crate::metrics;
use crate::state::AppState;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
/// Reply to text messages
pub const TEXT_REPLY: &str = "🎙 Please send a voice message. I will reply in voice.";
/// Reply when the voice file cannot be fetched from Telegram
pub const DOWNLOAD_FAILED_REPLY: &str = "Audio file process nahi ho paayi. Please dubara bhejein.";

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Http(String),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("Telegram is not configured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors embed the request URL, which contains the bot token
        TelegramError::Http(err.without_url().to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<FileRef>,
    #[serde(default)]
    pub audio: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

/// Minimal Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let token = config
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TelegramError::Config("bot token is not set".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TelegramError::Config(e.to_string()))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn check<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>, TelegramError> {
        let body: ApiResponse<T> = response.json().await?;
        if body.ok {
            Ok(body.result)
        } else {
            Err(TelegramError::Api(body.description.unwrap_or_else(|| "unknown error".to_string())))
        }
    }

    /// Resolve a file id to its download path
    pub async fn get_file_path(&self, file_id: &str) -> Result<String, TelegramError> {
        let response = self
            .http
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?;
        Self::check::<FileInfo>(response)
            .await?
            .and_then(|info| info.file_path)
            .ok_or_else(|| TelegramError::Api("getFile returned no file_path".to_string()))
    }

    pub async fn download(&self, file_path: &str) -> Result<Vec<u8>, TelegramError> {
        let response = self.http.get(self.file_url(file_path)).send().await?;
        if !response.status().is_success() {
            return Err(TelegramError::Api(format!("file download returned {}", response.status())));
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        Self::check::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn send_voice(&self, chat_id: i64, audio: &SynthesizedAudio) -> Result<(), TelegramError> {
        let extension = AudioFormat::from_mime(&audio.mime_type)
            .unwrap_or(AudioFormat::Mp3)
            .extension();
        let part = Part::bytes(audio.bytes.clone())
            .file_name(format!("reply.{}", extension))
            .mime_str(&audio.mime_type)?;
        let form = Form::new().text("chat_id", chat_id.to_string()).part("voice", part);

        let response = self
            .http
            .post(self.method_url("sendVoice"))
            .multipart(form)
            .send()
            .await?;
        Self::check::<serde_json::Value>(response).await.map(|_| ())
    }
}

/// Insertion-ordered set of recently seen update ids
#[derive(Debug)]
pub struct UpdateDedup {
    capacity: usize,
    seen: HashSet<i64>,
    order: VecDeque<i64>,
}

impl UpdateDedup {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// True the first time an id is seen within the window
    pub fn first_sighting(&mut self, update_id: i64) -> bool {
        if !self.seen.insert(update_id) {
            return false;
        }
        self.order.push_back(update_id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

/// Webhook-side state: API client, duplicate window, expected secret
pub struct TelegramBot {
    client: TelegramClient,
    dedup: Mutex<UpdateDedup>,
    secret_token: Option<String>,
}

impl TelegramBot {
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        Ok(Self {
            client: TelegramClient::new(config)?,
            dedup: Mutex::new(UpdateDedup::new(config.dedup_capacity)),
            secret_token: config.secret_token.clone().filter(|s| !s.is_empty()),
        })
    }

    fn secret_matches(&self, headers: &HeaderMap) -> bool {
        match &self.secret_token {
            None => true,
            Some(expected) => headers
                .get(SECRET_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|provided| constant_time_compare(provided.as_bytes(), expected.as_bytes()))
                .unwrap_or(false),
        }
    }
}

/// Apology sent instead of audio; never includes provider detail
pub fn apology_for(category: ErrorCategory) -> Option<&'static str> {
    match category {
        ErrorCategory::EmptyTranscript => {
            Some("Maaf kijiye, aapki awaaz saaf sunai nahi di. Kripya dobara voice message bhejein.")
        }
        ErrorCategory::UnsupportedLanguage => {
            Some("Maaf kijiye, is bhasha mein abhi awaaz mein jawab dena sambhav nahi hai.")
        }
        ErrorCategory::RetryableUpstream => {
            Some("Sewa abhi vyast hai. Kripya kuch der baad dobara koshish karein.")
        }
        ErrorCategory::TerminalUpstream => {
            Some("Maaf kijiye, aapka sandesh process nahi ho paaya. Kripya dobara bhejein.")
        }
        ErrorCategory::CancelledByCaller => None,
    }
}

fn status(value: &'static str) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": value }))
}

/// `POST /api/webhook/telegram`
pub async fn webhook_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(bot) = state.telegram.clone() else {
        return (StatusCode::NOT_FOUND, status("disabled")).into_response();
    };

    if !bot.secret_matches(&headers) {
        tracing::warn!("Telegram webhook called with a wrong secret token");
        return (StatusCode::UNAUTHORIZED, status("unauthorized")).into_response();
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Unparseable Telegram update");
            return Json(serde_json::json!({ "status": "error", "message": "Invalid JSON payload" }))
                .into_response();
        }
    };

    let Some(message) = update.message else {
        tracing::debug!(update_id = update.update_id, "Ignoring non-message update");
        return status("ignored").into_response();
    };

    if !bot.dedup.lock().first_sighting(update.update_id) {
        tracing::info!(update_id = update.update_id, "Duplicate Telegram update ignored");
        return status("duplicate").into_response();
    }

    metrics::record_request("telegram");
    tracing::info!(
        update_id = update.update_id,
        chat_id = message.chat.id,
        has_voice = message.voice.is_some() || message.audio.is_some(),
        "Telegram update accepted"
    );

    tokio::spawn(process_message(bot, state.orchestrator.clone(), message));
    status("ok").into_response()
}

async fn process_message(bot: std::sync::Arc<TelegramBot>, orchestrator: PipelineOrchestrator, message: Message) {
    let chat_id = message.chat.id;

    let Some(file) = message.voice.or(message.audio) else {
        if message.text.is_some() {
            reply(&bot.client, chat_id, TEXT_REPLY).await;
        }
        return;
    };

    let bytes = match fetch_audio(&bot.client, &file.file_id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(chat_id, error = %e, "Could not fetch Telegram audio");
            reply(&bot.client, chat_id, DOWNLOAD_FAILED_REPLY).await;
            return;
        }
    };

    let format = AudioFormat::detect(file.mime_type.as_deref(), file.file_name.as_deref());
    let request = VoiceRequest::new(AudioPayload::new(bytes, format));

    match orchestrator.run(request).await {
        Ok(result) => {
            metrics::record_run(&result);
            if let Err(e) = bot.client.send_voice(chat_id, &result.audio).await {
                tracing::error!(
                    chat_id,
                    correlation_id = %result.correlation_id,
                    error = %e,
                    "Failed to send voice reply"
                );
            }
        }
        Err(err) => {
            metrics::record_failure(&err);
            if let Some(text) = apology_for(err.category) {
                reply(&bot.client, chat_id, text).await;
            }
        }
    }
}

async fn fetch_audio(client: &TelegramClient, file_id: &str) -> Result<Vec<u8>, TelegramError> {
    let path = client.get_file_path(file_id).await?;
    client.download(&path).await
}

async fn reply(client: &TelegramClient, chat_id: i64, text: &str) {
    if let Err(e) = client.send_message(chat_id, text).await {
        tracing::error!(chat_id, error = %e, "Failed to send Telegram message");
    }
}
