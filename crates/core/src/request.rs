//! Inbound voice request

use crate::audio::AudioPayload;

/// A farmer's spoken query, as received by a delivery adapter
#[derive(Debug, Clone)]
pub struct VoiceRequest {
    audio: AudioPayload,
    language: Option<String>,
    correlation_id: String,
}

impl VoiceRequest {
    /// New request with a fresh correlation id and no declared language
    pub fn new(audio: AudioPayload) -> Self {
        Self {
            audio,
            language: None,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Declare the language the caller is speaking.
    ///
    /// Blank values are treated as "not declared".
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn audio(&self) -> &AudioPayload {
        &self.audio
    }

    pub fn declared_language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioFormat;

    #[test]
    fn test_blank_language_is_undeclared() {
        let req = VoiceRequest::new(AudioPayload::new(vec![1], AudioFormat::Ogg))
            .with_language(Some("  ".to_string()));
        assert_eq!(req.declared_language(), None);

        let req = req.with_language(Some("TA".to_string()));
        assert_eq!(req.declared_language(), Some("ta"));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = VoiceRequest::new(AudioPayload::new(vec![], AudioFormat::Ogg));
        let b = VoiceRequest::new(AudioPayload::new(vec![], AudioFormat::Ogg));
        assert_ne!(a.correlation_id(), b.correlation_id());
    }
}
