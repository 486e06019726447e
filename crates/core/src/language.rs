//! Language catalogue for Indian farmers
//!
//! Covers the languages the transcription and advisory models are prompted
//! with: scheduled Indian languages spoken in farming regions, a few widely
//! spoken regional languages (Bhojpuri, Rajasthani), and English.
//!
//! Language *codes* flow through the pipeline as plain strings so that codes
//! outside this catalogue can still be reported (and rejected) precisely.

use serde::{Deserialize, Serialize};

/// Languages known to the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    #[default]
    Hindi,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Bengali,
    Marathi,
    Gujarati,
    Punjabi,
    Odia,
    Assamese,
    Urdu,
    Kashmiri,
    Sindhi,
    Maithili,
    Nepali,
    Bhojpuri,
    Rajasthani,
}

impl Language {
    /// Get ISO 639-1/639-3 code
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Tamil => "ta",
            Self::Telugu => "te",
            Self::Kannada => "kn",
            Self::Malayalam => "ml",
            Self::Bengali => "bn",
            Self::Marathi => "mr",
            Self::Gujarati => "gu",
            Self::Punjabi => "pa",
            Self::Odia => "or",
            Self::Assamese => "as",
            Self::Urdu => "ur",
            Self::Kashmiri => "ks",
            Self::Sindhi => "sd",
            Self::Maithili => "mai",
            Self::Nepali => "ne",
            Self::Bhojpuri => "bh",
            Self::Rajasthani => "raj",
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Tamil => "Tamil",
            Self::Telugu => "Telugu",
            Self::Kannada => "Kannada",
            Self::Malayalam => "Malayalam",
            Self::Bengali => "Bengali",
            Self::Marathi => "Marathi",
            Self::Gujarati => "Gujarati",
            Self::Punjabi => "Punjabi",
            Self::Odia => "Odia",
            Self::Assamese => "Assamese",
            Self::Urdu => "Urdu",
            Self::Kashmiri => "Kashmiri",
            Self::Sindhi => "Sindhi",
            Self::Maithili => "Maithili",
            Self::Nepali => "Nepali",
            Self::Bhojpuri => "Bhojpuri",
            Self::Rajasthani => "Rajasthani",
        }
    }

    /// Get script the language is usually written in
    pub fn script(&self) -> Script {
        match self {
            Self::Hindi | Self::Marathi | Self::Maithili | Self::Nepali
            | Self::Bhojpuri | Self::Rajasthani => Script::Devanagari,
            // Kashmiri and Sindhi are also written in Devanagari in India
            Self::Kashmiri | Self::Sindhi => Script::Devanagari,
            Self::Tamil => Script::Tamil,
            Self::Telugu => Script::Telugu,
            Self::Kannada => Script::Kannada,
            Self::Malayalam => Script::Malayalam,
            Self::Bengali | Self::Assamese => Script::Bengali,
            Self::Gujarati => Script::Gujarati,
            Self::Punjabi => Script::Gurmukhi,
            Self::Odia => Script::Odia,
            Self::Urdu => Script::Arabic,
            Self::English => Script::Latin,
        }
    }

    /// Exact lookup by ISO code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        Self::all().iter().copied().find(|l| l.code() == code)
    }

    /// Parse from a code or a language name as models tend to write it
    /// ("Hindi", "TAMIL", "Bangla", "hindi (bhojpuri dialect)" → first match).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if let Some(lang) = Self::from_code(&s) {
            return Some(lang);
        }
        match s.as_str() {
            "eng" | "english" => return Some(Self::English),
            "hin" | "hindi" | "hinglish" => return Some(Self::Hindi),
            "bangla" => return Some(Self::Bengali),
            "oriya" => return Some(Self::Odia),
            "panjabi" => return Some(Self::Punjabi),
            _ => {}
        }
        // Dialect names first so "Bhojpuri (Hindi)" is not read as Hindi
        const NAME_ORDER: &[Language] = &[
            Language::Bhojpuri,
            Language::Maithili,
            Language::Rajasthani,
            Language::Hindi,
            Language::Tamil,
            Language::Telugu,
            Language::Bengali,
            Language::Marathi,
            Language::Gujarati,
            Language::Punjabi,
            Language::Kannada,
            Language::Malayalam,
            Language::Urdu,
            Language::English,
            Language::Nepali,
            Language::Odia,
            Language::Assamese,
            Language::Kashmiri,
            Language::Sindhi,
        ];
        NAME_ORDER
            .iter()
            .copied()
            .find(|l| s.contains(&l.name().to_lowercase()))
    }

    /// Get all catalogue languages
    pub fn all() -> &'static [Language] {
        &[
            Self::English,
            Self::Hindi,
            Self::Tamil,
            Self::Telugu,
            Self::Kannada,
            Self::Malayalam,
            Self::Bengali,
            Self::Marathi,
            Self::Gujarati,
            Self::Punjabi,
            Self::Odia,
            Self::Assamese,
            Self::Urdu,
            Self::Kashmiri,
            Self::Sindhi,
            Self::Maithili,
            Self::Nepali,
            Self::Bhojpuri,
            Self::Rajasthani,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Script systems used by Indian languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Script {
    Latin,
    Devanagari,
    Bengali,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Gujarati,
    Gurmukhi,
    Odia,
    Arabic,
}

impl Script {
    /// Get Unicode range for this script (first block only)
    pub fn unicode_range(&self) -> (u32, u32) {
        match self {
            Self::Latin => (0x0000, 0x007F),
            Self::Devanagari => (0x0900, 0x097F),
            Self::Bengali => (0x0980, 0x09FF),
            Self::Tamil => (0x0B80, 0x0BFF),
            Self::Telugu => (0x0C00, 0x0C7F),
            Self::Kannada => (0x0C80, 0x0CFF),
            Self::Malayalam => (0x0D00, 0x0D7F),
            Self::Gujarati => (0x0A80, 0x0AFF),
            Self::Gurmukhi => (0x0A00, 0x0A7F),
            Self::Odia => (0x0B00, 0x0B7F),
            Self::Arabic => (0x0600, 0x06FF),
        }
    }

    /// Check if a character belongs to this script
    pub fn contains_char(&self, c: char) -> bool {
        let code = c as u32;
        let (start, end) = self.unicode_range();
        code >= start && code <= end
    }

    /// Share of non-whitespace characters that belong to this script
    pub fn ratio(&self, text: &str) -> f32 {
        let mut total = 0usize;
        let mut matching = 0usize;
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            total += 1;
            if self.contains_char(c) {
                matching += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        matching as f32 / total as f32
    }
}

/// Share of all characters (whitespace included) that are ASCII.
///
/// Empty text counts as fully ASCII.
pub fn ascii_ratio(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 1.0;
    }
    text.chars().filter(|c| c.is_ascii()).count() as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_code() {
        assert_eq!(Language::Hindi.code(), "hi");
        assert_eq!(Language::Bhojpuri.code(), "bh");
        assert_eq!(Language::English.code(), "en");
    }

    #[test]
    fn test_language_script() {
        assert_eq!(Language::Hindi.script(), Script::Devanagari);
        assert_eq!(Language::Tamil.script(), Script::Tamil);
        assert_eq!(Language::Urdu.script(), Script::Arabic);
        assert_eq!(Language::Assamese.script(), Script::Bengali);
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Language::from_code("HI"), Some(Language::Hindi));
        assert_eq!(Language::from_code("raj"), Some(Language::Rajasthani));
        assert_eq!(Language::from_code("fr"), None);
    }

    #[test]
    fn test_language_from_str_loose() {
        assert_eq!(Language::from_str_loose("hi"), Some(Language::Hindi));
        assert_eq!(Language::from_str_loose(" Hindi "), Some(Language::Hindi));
        assert_eq!(Language::from_str_loose("TAMIL"), Some(Language::Tamil));
        assert_eq!(Language::from_str_loose("bangla"), Some(Language::Bengali));
        assert_eq!(Language::from_str_loose("Bhojpuri (Hindi dialect)"), Some(Language::Bhojpuri));
        assert_eq!(Language::from_str_loose("klingon"), None);
    }

    #[test]
    fn test_script_ratio() {
        assert!(Script::Devanagari.ratio("नमस्ते किसान") > 0.9);
        assert_eq!(Script::Devanagari.ratio("hello"), 0.0);
        assert_eq!(Script::Devanagari.ratio("   "), 0.0);
    }

    #[test]
    fn test_ascii_ratio() {
        assert_eq!(ascii_ratio(""), 1.0);
        assert_eq!(ascii_ratio("abc"), 1.0);
        assert!(ascii_ratio("வணக்கம்") < 0.1);
    }

    #[test]
    fn test_all_languages() {
        assert_eq!(Language::all().len(), 19);
    }
}
