//! Speech processing traits

use async_trait::async_trait;
use crate::{AudioPayload, Language, Result, SynthesizedAudio, Transcript, VoiceIdentity};

/// Speech-to-Text interface
///
/// Implementations:
/// - `GeminiTranscriber` - multimodal Gemini transcription with language detection
/// - `WhisperApiTranscriber` - OpenAI-compatible transcription endpoint
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechToText> = Arc::new(GeminiTranscriber::new(client));
/// let transcript = stt.transcribe(&payload, None).await?;
/// println!("{} ({})", transcript.text, transcript.language);
/// ```
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe one complete utterance
    ///
    /// # Arguments
    /// * `audio` - Encoded audio as received from the caller
    /// * `language_hint` - Language code declared by the caller, if any
    ///
    /// # Returns
    /// Transcript with text and detected language code
    async fn transcribe(&self, audio: &AudioPayload, language_hint: Option<&str>) -> Result<Transcript>;

    /// Languages this transcriber can report
    fn supported_languages(&self) -> &[Language];

    /// Get model name for logging
    fn model_name(&self) -> &str;

    /// Check if a specific language is supported
    fn supports_language(&self, lang: Language) -> bool {
        self.supported_languages().contains(&lang)
    }
}

/// Text-to-Speech interface
///
/// Implementations:
/// - `AzureNeuralSynthesizer` - speaks with the routed neural voice
/// - `ElevenLabsSynthesizer` - one multilingual voice for every language
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize text to audio
    ///
    /// # Arguments
    /// * `text` - Text to speak
    /// * `voice` - Voice chosen by the language router
    async fn synthesize(&self, text: &str, voice: &VoiceIdentity) -> Result<SynthesizedAudio>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStt {
        languages: Vec<Language>,
    }

    #[async_trait]
    impl SpeechToText for MockStt {
        async fn transcribe(&self, _audio: &AudioPayload, hint: Option<&str>) -> Result<Transcript> {
            Ok(Transcript::new("Test transcription", hint.unwrap_or("hi")))
        }

        fn supported_languages(&self) -> &[Language] {
            &self.languages
        }

        fn model_name(&self) -> &str {
            "mock-stt"
        }
    }

    #[test]
    fn test_supports_language() {
        let stt = MockStt {
            languages: vec![Language::Hindi, Language::English],
        };
        assert!(stt.supports_language(Language::Hindi));
        assert!(!stt.supports_language(Language::Tamil));
    }

    #[tokio::test]
    async fn test_hint_flows_through() {
        let stt = MockStt { languages: vec![] };
        let audio = AudioPayload::new(vec![0u8; 4], crate::AudioFormat::Ogg);
        let t = stt.transcribe(&audio, Some("ta")).await.unwrap();
        assert_eq!(t.language, "ta");
    }
}
