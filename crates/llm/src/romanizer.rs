//! TTS romanizer
//!
//! The multilingual TTS voice reads Latin and Devanagari text well but
//! mispronounces the southern and eastern scripts. Advice in those scripts is
//! rewritten phonetically in Latin letters before synthesis.

use std::sync::Arc;

use async_trait::async_trait;

use kisan_voice_core::language::ascii_ratio;
use kisan_voice_core::{Advisory, Error, OptimizedText, Result, Script, TextOptimizer};

use crate::client::GenerativeBackend;
use crate::prompt::{self, GenerationRequest};

/// Above this share of ASCII characters text is treated as already Latin
const ALREADY_ROMAN_RATIO: f32 = 0.9;

/// Above this share of Devanagari characters text is spoken as-is
const DEVANAGARI_RATIO: f32 = 0.3;

/// A romanized answer must reach this ASCII share to be accepted
const ROMANIZED_MIN_RATIO: f32 = 0.8;

pub struct GeminiRomanizer {
    backend: Arc<dyn GenerativeBackend>,
}

impl GeminiRomanizer {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

/// Whether text can go to TTS without rewriting
pub fn needs_romanization(text: &str, language: &str) -> bool {
    if ascii_ratio(text) > ALREADY_ROMAN_RATIO {
        return false;
    }
    if prompt::is_devanagari_language(language) || Script::Devanagari.ratio(text) > DEVANAGARI_RATIO {
        return false;
    }
    true
}

#[async_trait]
impl TextOptimizer for GeminiRomanizer {
    async fn optimize(&self, advisory: &Advisory) -> Result<OptimizedText> {
        if !needs_romanization(&advisory.text, &advisory.language) {
            tracing::debug!(language = %advisory.language, "Advice already pronounceable");
            return Ok(OptimizedText::passthrough(advisory));
        }

        let request = GenerationRequest::new(prompt::romanizer_instruction(&advisory.language))
            .text(prompt::romanizer_request(&advisory.text));
        let romanized = self.backend.generate(&request).await?;

        let ratio = ascii_ratio(&romanized);
        if ratio <= ROMANIZED_MIN_RATIO {
            return Err(Error::InvalidResponse(format!(
                "romanization only {:.0}% ASCII",
                ratio * 100.0
            )));
        }

        tracing::debug!(
            language = %advisory.language,
            ascii_pct = (ratio * 100.0) as u32,
            "Advice romanized"
        );

        Ok(OptimizedText::romanized(romanized, advisory.language.clone()))
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
