//! ElevenLabs multilingual synthesis
//!
//! One configured voice speaks every language; the multilingual model picks
//! pronunciation from the text itself. The routed voice is therefore only
//! used for logging.

use async_trait::async_trait;
use serde::Serialize;

use kisan_voice_config::ElevenLabsConfig;
use kisan_voice_core::{Error, Result, SynthesizedAudio, TextToSpeech, VoiceIdentity};

use crate::http;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    config: ElevenLabsConfig,
    api_key: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: ElevenLabsConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("ElevenLabs API key is not set".to_string()))?;
        let client = http::client(config.timeout_ms)?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id,
            self.config.output_format
        )
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceIdentity) -> Result<SynthesizedAudio> {
        if text.trim().is_empty() {
            return Err(Error::InvalidRequest("nothing to synthesize".to_string()));
        }

        let body = SpeechRequest {
            text,
            model_id: &self.config.model,
        };
        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(e, self.config.timeout_ms))?;

        if !response.status().is_success() {
            return Err(http::status_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| http::send_error(e, self.config.timeout_ms))?;
        if bytes.is_empty() {
            return Err(Error::EmptyResponse("ElevenLabs returned no audio".to_string()));
        }

        tracing::debug!(
            voice_id = %self.config.voice_id,
            routed_language = %voice.language,
            bytes = bytes.len(),
            "ElevenLabs synthesis complete"
        );

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            mime_type: "audio/mpeg".to_string(),
            voice_id: self.config.voice_id.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizer() -> ElevenLabsSynthesizer {
        let mut config = ElevenLabsConfig::default();
        config.api_key = Some("xi-test".to_string());
        config.base_url = "https://api.elevenlabs.io/".to_string();
        ElevenLabsSynthesizer::new(config).unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            synthesizer().endpoint(),
            "https://api.elevenlabs.io/v1/text-to-speech/JBFqnCBsd6RMkjVDRZzb?output_format=mp3_44100_128"
        );
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(SpeechRequest {
            text: "Namaste kisan bhai",
            model_id: "eleven_multilingual_v2",
        })
        .unwrap();
        assert_eq!(body["text"], "Namaste kisan bhai");
        assert_eq!(body["model_id"], "eleven_multilingual_v2");
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            ElevenLabsSynthesizer::new(ElevenLabsConfig::default()),
            Err(Error::Config(_))
        ));
    }
}
