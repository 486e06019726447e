//! Core traits and types for the farmer voice assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Stage adapter traits (STT, advisory LLM, TTS optimizer, TTS)
//! - Audio payload types
//! - Language catalogue (Indian languages + English) and script helpers
//! - Voice identity types
//! - Provider error taxonomy

pub mod audio;
pub mod error;
pub mod language;
pub mod request;
pub mod traits;
pub mod transcript;
pub mod voice_config;

pub use audio::{AudioFormat, AudioPayload, SynthesizedAudio};
pub use error::{Error, Result};
pub use language::{Language, Script};
pub use request::VoiceRequest;
pub use transcript::{Advisory, OptimizationMode, OptimizedText, Transcript};
pub use voice_config::{VoiceGender, VoiceIdentity, VoiceSelection};

pub use traits::{Advisor, SpeechToText, TextOptimizer, TextToSpeech};
