//! Run results and classified failures

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kisan_voice_core::{Advisory, OptimizedText, SynthesizedAudio, Transcript, VoiceSelection};

use crate::timing::{RunTimings, StageTiming};

/// Pipeline stage kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcribe,
    Advise,
    Optimize,
    Synthesize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Advise => "advise",
            Self::Optimize => "optimize",
            Self::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rate limit, 5xx or timeout that persisted through every retry
    RetryableUpstream,
    /// Malformed request, bad credentials or unsupported input
    TerminalUpstream,
    /// No voice for the run's language
    UnsupportedLanguage,
    /// Transcription produced no usable text
    EmptyTranscript,
    /// Caller went away; never reported to a delivery channel
    CancelledByCaller,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetryableUpstream => "retryable_upstream",
            Self::TerminalUpstream => "terminal_upstream",
            Self::UnsupportedLanguage => "unsupported_language",
            Self::EmptyTranscript => "empty_transcript",
            Self::CancelledByCaller => "cancelled_by_caller",
        }
    }

    /// Caller-facing explanation for this category
    pub fn message(&self) -> &'static str {
        match self {
            Self::RetryableUpstream => {
                "An upstream service is busy or unavailable. Please try again in a few minutes."
            }
            Self::TerminalUpstream => "An upstream service rejected the request.",
            Self::UnsupportedLanguage => "Voice replies are not available for this language yet.",
            Self::EmptyTranscript => "No speech could be recognised in the audio.",
            Self::CancelledByCaller => "The request was cancelled.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered deviation from the straight-through path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    /// Optimization failed; the advisory text was spoken instead
    OptimizationSkipped {
        /// Error kind of the failure (no provider payload)
        reason: String,
    },
    /// The run's language has no native voice; a related one was used
    VoiceSubstituted {
        requested: String,
        voice_language: String,
    },
}

impl Fallback {
    pub fn label(&self) -> &'static str {
        match self {
            Self::OptimizationSkipped { .. } => "optimization_skipped",
            Self::VoiceSubstituted { .. } => "voice_substituted",
        }
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub correlation_id: String,
    /// Transcript text; its language is the run language
    pub transcript: Transcript,
    /// Language the transcriber reported, before any declared override
    pub detected_language: String,
    pub advisory: Advisory,
    /// Present when the optimizer ran successfully
    pub optimized: Option<OptimizedText>,
    pub audio: SynthesizedAudio,
    /// Run language: declared by the caller, else detected
    pub language: String,
    pub voice: VoiceSelection,
    pub fallbacks: Vec<Fallback>,
    pub timings: RunTimings,
}

impl PipelineResult {
    pub fn fallback_occurred(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    /// Text that was sent to synthesis
    pub fn tts_text(&self) -> &str {
        self.optimized
            .as_ref()
            .map(|o| o.text.as_str())
            .unwrap_or(&self.advisory.text)
    }
}

/// A run that could not complete
///
/// `message` is derived from the category and safe to show to callers;
/// `detail` carries the adapter error for logs only.
#[derive(Error, Debug, Clone)]
#[error("{stage} failed ({category}): {detail}")]
pub struct PipelineError {
    pub correlation_id: String,
    pub stage: Stage,
    pub category: ErrorCategory,
    pub message: String,
    pub detail: String,
    pub elapsed: Duration,
    /// Stages that finished before the failure, including the failing one
    pub stages: Vec<StageTiming>,
}

impl PipelineError {
    pub fn new(
        correlation_id: impl Into<String>,
        stage: Stage,
        category: ErrorCategory,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            stage,
            category,
            message: category.message().to_string(),
            detail: detail.into(),
            elapsed: Duration::ZERO,
            stages: Vec::new(),
        }
    }

    pub fn with_timings(mut self, elapsed: Duration, stages: Vec<StageTiming>) -> Self {
        self.elapsed = elapsed;
        self.stages = stages;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::CancelledByCaller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_hides_detail() {
        let err = PipelineError::new(
            "abc",
            Stage::Synthesize,
            ErrorCategory::RetryableUpstream,
            "503: {\"detail\":\"internal stack trace\"}",
        );
        assert!(!err.message.contains("stack trace"));
        assert_eq!(err.stage.as_str(), "synthesize");
        assert_eq!(err.category.to_string(), "retryable_upstream");
    }

    #[test]
    fn test_fallback_serialization() {
        let fallback = Fallback::VoiceSubstituted {
            requested: "pa".to_string(),
            voice_language: "hi".to_string(),
        };
        let json = serde_json::to_value(&fallback).unwrap();
        assert_eq!(json["kind"], "voice_substituted");
        assert_eq!(json["requested"], "pa");
        assert_eq!(fallback.label(), "voice_substituted");
    }
}
