//! Multimodal Gemini transcription

use std::sync::Arc;

use async_trait::async_trait;

use kisan_voice_core::{AudioPayload, Error, Language, Result, SpeechToText, Transcript};

use crate::client::GenerativeBackend;
use crate::prompt::{self, GenerationRequest, TRANSCRIBABLE_LANGUAGES};
use crate::LlmError;

/// Transcripts of a minute-long voice note fit comfortably in this
const TRANSCRIPTION_MAX_TOKENS: u32 = 2048;

/// Detected language when the model does not name one
const DEFAULT_LANGUAGE: Language = Language::Hindi;

/// Speech-to-text through Gemini's audio understanding
pub struct GeminiTranscriber {
    backend: Arc<dyn GenerativeBackend>,
}

impl GeminiTranscriber {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    fn build_request(audio: &AudioPayload, language_hint: Option<&str>) -> GenerationRequest {
        let mut request = GenerationRequest::new(prompt::transcription_instruction())
            .inline_data(audio.mime_type(), audio.bytes.clone())
            .text(prompt::TRANSCRIPTION_REQUEST)
            .max_output_tokens(TRANSCRIPTION_MAX_TOKENS);

        if let Some(hint) = language_hint {
            request = request.text(format!(
                "The speaker is expected to use {}.",
                prompt::language_name(hint)
            ));
        }
        request
    }
}

/// Parse the `LANGUAGE:` / `TEXT:` answer format
///
/// Without both markers the whole answer is taken as the transcript.
/// Everything after `TEXT:` belongs to the transcript, including later lines.
pub fn parse_transcription(raw: &str) -> Transcript {
    let raw = raw.trim();
    if !(raw.contains("LANGUAGE:") && raw.contains("TEXT:")) {
        return Transcript::new(raw, DEFAULT_LANGUAGE.code());
    }

    let mut language = DEFAULT_LANGUAGE;
    let mut text_lines: Vec<&str> = Vec::new();
    let mut in_text = false;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("LANGUAGE:") {
            language = Language::from_str_loose(rest).unwrap_or(DEFAULT_LANGUAGE);
            in_text = false;
        } else if let Some(rest) = trimmed.strip_prefix("TEXT:") {
            text_lines.push(rest.trim());
            in_text = true;
        } else if in_text {
            text_lines.push(line.trim());
        }
    }

    Transcript::new(text_lines.join("\n").trim(), language.code())
}

#[async_trait]
impl SpeechToText for GeminiTranscriber {
    async fn transcribe(&self, audio: &AudioPayload, language_hint: Option<&str>) -> Result<Transcript> {
        if audio.is_empty() {
            return Err(Error::UnsupportedInput("empty audio".to_string()));
        }

        let request = Self::build_request(audio, language_hint);
        let raw = match self.backend.generate(&request).await {
            Ok(raw) => raw,
            // Silence or a blocked clip: nothing was heard, asking again will not help
            Err(LlmError::Empty(reason)) => {
                tracing::info!(reason = %reason, "Gemini heard no speech");
                let language = language_hint.unwrap_or(DEFAULT_LANGUAGE.code());
                return Ok(Transcript::new("", language));
            }
            Err(e) => return Err(e.into()),
        };
        let transcript = parse_transcription(&raw);

        tracing::debug!(
            language = %transcript.language,
            chars = transcript.text.chars().count(),
            "Gemini transcription parsed"
        );

        Ok(transcript)
    }

    fn supported_languages(&self) -> &[Language] {
        TRANSCRIBABLE_LANGUAGES
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
