//! Voice pipeline orchestration
//!
//! This crate sequences one spoken query through the external services:
//! - Retry executor with fixed backoff tables and per-attempt timeouts
//! - Language router from language code to TTS voice, with fallbacks
//! - Per-run timing recorder
//! - Run state machine (pure transitions)
//! - Pipeline orchestrator (Transcribe → Advise → [Optimize] → Synthesize)
//! - Append-only run log
//! - HTTP speech providers (Whisper API, ElevenLabs, Azure neural voices)

mod http;
pub mod orchestrator;
pub mod result;
pub mod retry;
pub mod router;
pub mod run_log;
pub mod state;
pub mod stt;
pub mod timing;
pub mod tts;

pub use orchestrator::{PipelineOrchestrator, PipelineOrchestratorBuilder, StagePolicies};
pub use result::{ErrorCategory, Fallback, PipelineError, PipelineResult, Stage};
pub use retry::{RetryExecutor, RetryPolicy, Retryability, StageFailure, StageOutcome};
pub use router::{LanguageRouter, RouterError};
pub use run_log::{RunLog, RunLogSink, RunOutcome, RunRecord};
pub use state::{PipelineVariant, RunState, StepResult};
pub use stt::WhisperApiTranscriber;
pub use timing::{RunTimings, StageTiming, TimingRecorder};
pub use tts::{AzureNeuralSynthesizer, ElevenLabsSynthesizer};

pub use tokio_util::sync::CancellationToken;
