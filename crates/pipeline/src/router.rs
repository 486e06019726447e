//! Language → TTS voice routing
//!
//! One static table decides which neural voice speaks each language. A
//! language is either served natively, or routed to the voice of a closely
//! related language (recorded as a substitution in the run result). Anything
//! else fails closed with [`RouterError::UnsupportedLanguage`].

use thiserror::Error;

use kisan_voice_core::{Language, VoiceGender, VoiceIdentity, VoiceSelection};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("No voice for language '{0}'")]
    UnsupportedLanguage(String),

    /// Languages the transcriber can report that the table does not cover
    #[error("Languages without a voice route: {}", .0.iter().map(|l| l.code()).collect::<Vec<_>>().join(", "))]
    MissingCoverage(Vec<Language>),
}

impl From<RouterError> for kisan_voice_core::Error {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::UnsupportedLanguage(_) => kisan_voice_core::Error::UnsupportedInput(err.to_string()),
            RouterError::MissingCoverage(_) => kisan_voice_core::Error::Config(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Native {
        locale: &'static str,
        female: &'static str,
        male: &'static str,
    },
    /// Speak with the voice of another language that has a native entry
    Fallback(Language),
}

const VOICE_TABLE: &[(Language, Route)] = &[
    (
        Language::Hindi,
        Route::Native {
            locale: "hi-IN",
            female: "hi-IN-SwaraNeural",
            male: "hi-IN-MadhurNeural",
        },
    ),
    (
        Language::Tamil,
        Route::Native {
            locale: "ta-IN",
            female: "ta-IN-PallaviNeural",
            male: "ta-IN-ValluvarNeural",
        },
    ),
    (
        Language::Telugu,
        Route::Native {
            locale: "te-IN",
            female: "te-IN-ShrutiNeural",
            male: "te-IN-MohanNeural",
        },
    ),
    (
        Language::Bengali,
        Route::Native {
            locale: "bn-IN",
            female: "bn-IN-TanishaaNeural",
            male: "bn-IN-BashkarNeural",
        },
    ),
    (
        Language::Marathi,
        Route::Native {
            locale: "mr-IN",
            female: "mr-IN-AarohiNeural",
            male: "mr-IN-ManoharNeural",
        },
    ),
    (
        Language::Gujarati,
        Route::Native {
            locale: "gu-IN",
            female: "gu-IN-DhwaniNeural",
            male: "gu-IN-NiranjanNeural",
        },
    ),
    (
        Language::Kannada,
        Route::Native {
            locale: "kn-IN",
            female: "kn-IN-SapnaNeural",
            male: "kn-IN-GaganNeural",
        },
    ),
    (
        Language::Malayalam,
        Route::Native {
            locale: "ml-IN",
            female: "ml-IN-SobhanaNeural",
            male: "ml-IN-MidhunNeural",
        },
    ),
    (
        Language::English,
        Route::Native {
            locale: "en-IN",
            female: "en-IN-NeerjaNeural",
            male: "en-IN-PrabhatNeural",
        },
    ),
    (
        Language::Urdu,
        Route::Native {
            locale: "ur-IN",
            female: "ur-IN-GulNeural",
            male: "ur-IN-SalmanNeural",
        },
    ),
    (
        Language::Nepali,
        Route::Native {
            locale: "ne-NP",
            female: "ne-NP-HemkalaNeural",
            male: "ne-NP-SagarNeural",
        },
    ),
    (
        Language::Odia,
        Route::Native {
            locale: "or-IN",
            female: "or-IN-SubhasiniNeural",
            male: "or-IN-SukantNeural",
        },
    ),
    (
        Language::Assamese,
        Route::Native {
            locale: "as-IN",
            female: "as-IN-YashicaNeural",
            male: "as-IN-PriyomNeural",
        },
    ),
    // No Punjabi neural voice; Hindi is the nearest intelligible one
    (Language::Punjabi, Route::Fallback(Language::Hindi)),
    (Language::Bhojpuri, Route::Fallback(Language::Hindi)),
];

/// Static language → voice table with a fixed gender preference
#[derive(Debug, Clone)]
pub struct LanguageRouter {
    gender: VoiceGender,
}

impl Default for LanguageRouter {
    fn default() -> Self {
        Self::new(VoiceGender::default())
    }
}

impl LanguageRouter {
    pub fn new(gender: VoiceGender) -> Self {
        Self { gender }
    }

    pub fn gender(&self) -> VoiceGender {
        self.gender
    }

    fn route(language: Language) -> Option<Route> {
        VOICE_TABLE
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, route)| *route)
    }

    fn native_voice(&self, language: Language) -> Option<VoiceIdentity> {
        match Self::route(language)? {
            Route::Native {
                locale,
                female,
                male,
            } => {
                let name = match self.gender {
                    VoiceGender::Female => female,
                    VoiceGender::Male => male,
                };
                Some(VoiceIdentity::new(name, locale, language, self.gender))
            }
            Route::Fallback(_) => None,
        }
    }

    /// Resolve the voice for a language code
    pub fn resolve_voice(&self, code: &str) -> Result<VoiceSelection, RouterError> {
        let unsupported = || RouterError::UnsupportedLanguage(code.to_string());
        let language = Language::from_code(code).ok_or_else(unsupported)?;

        match Self::route(language).ok_or_else(unsupported)? {
            Route::Native { .. } => {
                let voice = self.native_voice(language).ok_or_else(unsupported)?;
                Ok(VoiceSelection::native(language.code(), voice))
            }
            Route::Fallback(target) => {
                let voice = self.native_voice(target).ok_or_else(unsupported)?;
                Ok(VoiceSelection::substitute(language.code(), voice))
            }
        }
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.resolve_voice(code).is_ok()
    }

    /// Languages with a route, native or fallback
    pub fn routed_languages(&self) -> Vec<Language> {
        VOICE_TABLE.iter().map(|(lang, _)| *lang).collect()
    }

    /// Check at startup that every language a transcriber can report has a
    /// route
    pub fn validate_coverage(&self, languages: &[Language]) -> Result<(), RouterError> {
        let missing: Vec<Language> = languages
            .iter()
            .copied()
            .filter(|l| !self.is_supported(l.code()))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RouterError::MissingCoverage(missing))
        }
    }
}
