//! OpenAI-compatible Whisper transcription
//!
//! `POST {base}/audio/transcriptions` with a multipart form. `verbose_json`
//! is requested so the response carries the detected language, which the
//! API reports as a lowercase English name ("hindi", "tamil").

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use kisan_voice_config::WhisperConfig;
use kisan_voice_core::error::truncate_body;
use kisan_voice_core::{AudioPayload, Error, Language, Result, SpeechToText, Transcript};

use crate::http;

/// Languages Whisper detects that we can also speak or route
const WHISPER_LANGUAGES: &[Language] = &[
    Language::Hindi,
    Language::English,
    Language::Tamil,
    Language::Telugu,
    Language::Kannada,
    Language::Malayalam,
    Language::Bengali,
    Language::Marathi,
    Language::Gujarati,
    Language::Punjabi,
    Language::Urdu,
    Language::Nepali,
    Language::Assamese,
];

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Whisper API transcriber
pub struct WhisperApiTranscriber {
    client: reqwest::Client,
    config: WhisperConfig,
    api_key: String,
}

impl WhisperApiTranscriber {
    pub fn new(config: WhisperConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("Whisper API key is not set".to_string()))?;
        let client = http::client(config.timeout_ms)?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.config.base_url.trim_end_matches('/'))
    }
}

/// Turn a `verbose_json` body into a transcript
///
/// Known language names map to catalogue codes. Anything else is kept as
/// reported so routing can reject it instead of guessing.
pub(crate) fn parse_transcription(body: &str) -> Result<Transcript> {
    let parsed: VerboseTranscription = serde_json::from_str(body)
        .map_err(|e| Error::InvalidResponse(format!("{}: {}", e, truncate_body(body, 200))))?;

    let language = match parsed.language.as_deref().map(str::trim) {
        None | Some("") => Language::default().code().to_string(),
        Some(reported) => Language::from_str_loose(reported)
            .map(|l| l.code().to_string())
            .unwrap_or_else(|| reported.to_lowercase()),
    };

    Ok(Transcript::new(parsed.text.trim(), language))
}

#[async_trait]
impl SpeechToText for WhisperApiTranscriber {
    async fn transcribe(&self, audio: &AudioPayload, language_hint: Option<&str>) -> Result<Transcript> {
        if audio.is_empty() {
            return Err(Error::UnsupportedInput("audio payload is empty".to_string()));
        }

        let file = Part::bytes(audio.bytes.clone())
            .file_name(format!("audio.{}", audio.format.extension()))
            .mime_str(audio.mime_type())
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json");
        if let Some(hint) = language_hint {
            form = form.text("language", hint.to_string());
        }

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| http::send_error(e, self.config.timeout_ms))?;

        if !response.status().is_success() {
            return Err(http::status_error(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| http::send_error(e, self.config.timeout_ms))?;
        let transcript = parse_transcription(&body)?;

        tracing::debug!(
            model = %self.config.model,
            language = %transcript.language,
            chars = transcript.text.chars().count(),
            "Whisper transcription complete"
        );

        Ok(transcript)
    }

    fn supported_languages(&self) -> &[Language] {
        WHISPER_LANGUAGES
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
