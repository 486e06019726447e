//! Run state machine
//!
//! ```text
//! Received → Transcribing → Advising → [Optimizing] → Synthesizing → Completed
//!                 ↓             ↓            ↓ (fallback)   ↓
//!               Failed        Failed    Synthesizing      Failed
//! ```
//!
//! Transitions are a pure function of the current state, the summarised
//! outcome of the stage that just ran, and the pipeline variant.

use serde::{Deserialize, Serialize};

use crate::result::{ErrorCategory, Stage};

/// Which optional stages a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineVariant {
    pub optimize: bool,
}

impl Default for PipelineVariant {
    fn default() -> Self {
        Self { optimize: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Received,
    Transcribing,
    Advising,
    Optimizing,
    Synthesizing,
    Completed,
    Failed { stage: Stage, category: ErrorCategory },
}

/// Outcome of the current stage as seen by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Run started; only meaningful in `Received`
    Started,
    Succeeded,
    EmptyTranscript,
    UnsupportedLanguage,
    Failed(ErrorCategory),
}

impl StepResult {
    fn failure_category(self) -> Option<ErrorCategory> {
        match self {
            Self::Started | Self::Succeeded => None,
            Self::EmptyTranscript => Some(ErrorCategory::EmptyTranscript),
            Self::UnsupportedLanguage => Some(ErrorCategory::UnsupportedLanguage),
            Self::Failed(category) => Some(category),
        }
    }
}

impl RunState {
    /// Stage whose external call this state performs
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Transcribing => Some(Stage::Transcribe),
            Self::Advising => Some(Stage::Advise),
            Self::Optimizing => Some(Stage::Optimize),
            Self::Synthesizing => Some(Stage::Synthesize),
            Self::Failed { stage, .. } => Some(*stage),
            Self::Received | Self::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    pub fn advance(self, step: StepResult, variant: &PipelineVariant) -> RunState {
        if self.is_terminal() {
            return self;
        }

        if self == Self::Received {
            return match step.failure_category() {
                Some(category) => Self::Failed {
                    stage: Stage::Transcribe,
                    category,
                },
                None => Self::Transcribing,
            };
        }

        if step == StepResult::Started {
            return self;
        }

        let category = match step.failure_category() {
            None => {
                return match self {
                    Self::Transcribing => Self::Advising,
                    Self::Advising if variant.optimize => Self::Optimizing,
                    Self::Advising | Self::Optimizing => Self::Synthesizing,
                    Self::Synthesizing => Self::Completed,
                    other => other,
                }
            }
            Some(category) => category,
        };

        match self {
            // Optimization is never fatal, except when the caller is gone
            Self::Optimizing if category != ErrorCategory::CancelledByCaller => Self::Synthesizing,
            _ => Self::Failed {
                stage: self.stage().unwrap_or(Stage::Transcribe),
                category,
            },
        }
    }
}
