//! Text-to-speech providers

mod azure;
mod elevenlabs;

pub use azure::AzureNeuralSynthesizer;
pub use elevenlabs::ElevenLabsSynthesizer;
