//! Voice identity types for TTS

use serde::{Deserialize, Serialize};
use crate::language::Language;

/// Voice gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    #[default]
    Female,
    Male,
}

/// A concrete TTS voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceIdentity {
    /// Neural voice name, e.g. `hi-IN-SwaraNeural`
    pub name: String,
    /// BCP-47 locale the voice speaks, e.g. `hi-IN`
    pub locale: String,
    /// Language the voice speaks natively
    pub language: Language,
    pub gender: VoiceGender,
}

impl VoiceIdentity {
    pub fn new(
        name: impl Into<String>,
        locale: impl Into<String>,
        language: Language,
        gender: VoiceGender,
    ) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            language,
            gender,
        }
    }
}

/// Outcome of routing a language code to a voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSelection {
    /// Language code the run asked for
    pub requested: String,
    /// Voice that will be used
    pub voice: VoiceIdentity,
    /// True when the voice belongs to a different language than requested
    pub substituted: bool,
}

impl VoiceSelection {
    pub fn native(requested: impl Into<String>, voice: VoiceIdentity) -> Self {
        Self {
            requested: requested.into(),
            voice,
            substituted: false,
        }
    }

    pub fn substitute(requested: impl Into<String>, voice: VoiceIdentity) -> Self {
        Self {
            requested: requested.into(),
            voice,
            substituted: true,
        }
    }
}
