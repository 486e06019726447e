//! Stage adapter traits
//!
//! Each external capability the orchestrator needs is one trait. Providers
//! implement the traits; the orchestrator only ever holds trait objects, so
//! backends can be swapped by configuration and replaced by mocks in tests.
//!
//! ```text
//! Speech Processing:
//!   - SpeechToText: Audio → Transcript
//!   - TextToSpeech: Text → Audio
//!
//! Language Models:
//!   - Advisor: Transcript text → agricultural advice
//!   - TextOptimizer: Advice → TTS-pronounceable text
//! ```

mod llm;
mod speech;

pub use llm::{Advisor, TextOptimizer};
pub use speech::{SpeechToText, TextToSpeech};
