//! Prompt building
//!
//! System instructions for the three Gemini roles and the request type the
//! client sends.

use kisan_voice_core::{Language, Script};

/// One piece of user content
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Raw bytes sent base64-encoded as `inlineData`
    InlineData { mime_type: String, data: Vec<u8> },
}

/// A single-turn generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub parts: Vec<Part>,
    /// Overrides the configured output limit
    pub max_output_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            parts: Vec::new(),
            max_output_tokens: None,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }

    pub fn inline_data(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.parts.push(Part::InlineData {
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    pub fn max_output_tokens(mut self, limit: u32) -> Self {
        self.max_output_tokens = Some(limit);
        self
    }
}

/// Display name for a language code, as the prompts spell it
pub fn language_name(code: &str) -> String {
    match Language::from_code(code) {
        Some(lang) => lang.name().to_string(),
        None => code.to_string(),
    }
}

/// True for languages written in Devanagari (Hindi, Marathi, Nepali and the
/// Hindi-belt dialects)
pub fn is_devanagari_language(code: &str) -> bool {
    Language::from_code(code).map_or(false, |l| l.script() == Script::Devanagari)
}

/// Languages the transcription prompt asks the model to tell apart
pub const TRANSCRIBABLE_LANGUAGES: &[Language] = &[
    Language::Hindi,
    Language::Tamil,
    Language::Telugu,
    Language::Bengali,
    Language::Marathi,
    Language::Gujarati,
    Language::Punjabi,
    Language::Kannada,
    Language::Malayalam,
    Language::Urdu,
    Language::English,
    Language::Bhojpuri,
    Language::Nepali,
    Language::Odia,
    Language::Assamese,
];

pub fn transcription_instruction() -> String {
    let names: Vec<&str> = TRANSCRIBABLE_LANGUAGES.iter().map(|l| l.name()).collect();
    format!(
        "You are an expert audio transcriber for Indian languages.\n\
         \n\
         Your task:\n\
         1. Listen to the audio carefully\n\
         2. Transcribe EXACTLY what is spoken\n\
         3. Detect the language AND dialect\n\
         \n\
         Output format:\n\
         LANGUAGE: [language name]\n\
         TEXT: [transcribed text]\n\
         \n\
         Rules:\n\
         - Transcribe in the ORIGINAL script\n\
         - Do NOT translate to English\n\
         - For Hindi/Hinglish, keep English words as-is\n\
         - Distinguish carefully between Hindi, Urdu and Punjabi\n\
         - Preserve the exact dialect spoken (e.g. Bhojpuri vs Hindi)\n\
         - LANGUAGE must be one of: {}",
        names.join(", ")
    )
}

pub const TRANSCRIPTION_REQUEST: &str = "Transcribe this audio.";

pub fn advisor_instruction(language: &str) -> String {
    let name = Language::from_code(language)
        .map(|l| l.name().to_string())
        .unwrap_or_else(|| "the user's language".to_string());

    let style = if language == Language::Hindi.code() {
        "Use casual Hinglish.".to_string()
    } else if is_devanagari_language(language) {
        format!("Respond naturally in {}.", name)
    } else {
        format!("Use natural {}.", name)
    };

    format!(
        "You are an agricultural advisor for Indian farmers.\n\
         Respond in {}. {}\n\
         Keep answers SHORT (2-3 sentences) for voice output.",
        name, style
    )
}

pub fn romanizer_instruction(language: &str) -> String {
    format!(
        "Convert {} to romanized pronunciation.\n\
         Do NOT translate. Write phonetically in English letters.\n\
         Output ONLY the romanized text.",
        language_name(language)
    )
}

pub fn romanizer_request(text: &str) -> String {
    format!("Romanize: {}", text)
}
