//! Speech-to-text providers
//!
//! The Gemini transcriber lives in the LLM crate since it shares the Gemini
//! client; this module holds the dedicated speech APIs.

mod whisper;

pub use whisper::WhisperApiTranscriber;
