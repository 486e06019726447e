//! Text artefacts produced by the pipeline stages

use serde::{Deserialize, Serialize};

/// Output of the speech-to-text stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcribed text in the original script
    pub text: String,
    /// Detected language code (lower-case ISO code)
    pub language: String,
    /// Confidence score (0.0 - 1.0), when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Transcript {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into().trim().to_ascii_lowercase(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// True if there is no speech to act on
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Agricultural advice from the advisory model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub text: String,
    /// Language code the advice is written in
    pub language: String,
}

impl Advisory {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// How the optimizer produced its text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    /// Text was already pronounceable and was passed through untouched
    Passthrough,
    /// Text was rewritten into Latin script by a model
    Romanized,
}

/// TTS-ready rendering of an advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizedText {
    pub text: String,
    pub language: String,
    pub mode: OptimizationMode,
}

impl OptimizedText {
    pub fn passthrough(advisory: &Advisory) -> Self {
        Self {
            text: advisory.text.clone(),
            language: advisory.language.clone(),
            mode: OptimizationMode::Passthrough,
        }
    }

    pub fn romanized(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            mode: OptimizationMode::Romanized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_normalizes_language() {
        let t = Transcript::new("नमस्ते", " HI ");
        assert_eq!(t.language, "hi");
        assert!(!t.is_blank());
        assert!(Transcript::new("  \n", "hi").is_blank());
    }

    #[test]
    fn test_confidence_clamped() {
        let t = Transcript::new("x", "hi").with_confidence(1.7);
        assert_eq!(t.confidence, Some(1.0));
    }

    #[test]
    fn test_passthrough_keeps_text() {
        let advisory = Advisory::new("Neem oil spray karein.", "hi");
        let opt = OptimizedText::passthrough(&advisory);
        assert_eq!(opt.text, advisory.text);
        assert_eq!(opt.mode, OptimizationMode::Passthrough);
    }
}
