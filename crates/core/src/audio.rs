//! Audio payload types
//!
//! Audio is passed through opaquely: no decoding or transcoding happens in
//! this system. The only thing we need to know about a payload is which
//! container it is in, so providers can be told the right MIME type.

use serde::{Deserialize, Serialize};

/// Audio container formats accepted by upstream providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Opus in Ogg (Telegram voice notes)
    #[default]
    Ogg,
    Mp3,
    Wav,
    M4a,
    Webm,
}

impl AudioFormat {
    /// MIME type sent to providers
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::M4a => "audio/mp4",
            Self::Webm => "audio/webm",
        }
    }

    /// Conventional file extension (without dot)
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
            Self::Webm => "webm",
        }
    }

    /// Guess the format from a file name's extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "ogg" | "oga" | "opus" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "m4a" | "mp4" => Some(Self::M4a),
            "webm" => Some(Self::Webm),
            _ => None,
        }
    }

    /// Parse a declared MIME type (parameters such as `; codecs=opus` are ignored)
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "audio/ogg" | "audio/opus" | "application/ogg" => Some(Self::Ogg),
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some(Self::M4a),
            "audio/webm" => Some(Self::Webm),
            _ => None,
        }
    }

    /// Resolve from whatever the caller declared, MIME first.
    ///
    /// Falls back to Ogg, which is what the chat platform delivers.
    pub fn detect(mime: Option<&str>, file_name: Option<&str>) -> Self {
        mime.and_then(Self::from_mime)
            .or_else(|| file_name.and_then(Self::from_file_name))
            .unwrap_or_default()
    }
}

/// Inbound audio: raw bytes plus container format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioPayload {
    pub fn new(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self { bytes, format }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Audio produced by a TTS provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Provider-side voice id that produced this audio
    pub voice_id: String,
}
