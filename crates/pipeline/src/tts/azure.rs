//! Azure neural voices
//!
//! Speaks with the exact voice the language router picked, so each
//! language gets its own native speaker.

use async_trait::async_trait;

use kisan_voice_config::AzureSpeechConfig;
use kisan_voice_core::{Error, Result, SynthesizedAudio, TextToSpeech, VoiceIdentity};

use crate::http;

pub struct AzureNeuralSynthesizer {
    client: reqwest::Client,
    config: AzureSpeechConfig,
    api_key: String,
    url: String,
}

impl AzureNeuralSynthesizer {
    pub fn new(config: AzureSpeechConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("Azure Speech key is not set".to_string()))?;
        let client = http::client(config.timeout_ms)?;
        let url = config.synthesis_url();
        Ok(Self {
            client,
            config,
            api_key,
            url,
        })
    }

    fn mime_type(&self) -> &'static str {
        if self.config.output_format.contains("mp3") {
            "audio/mpeg"
        } else if self.config.output_format.contains("opus") {
            "audio/ogg"
        } else {
            "audio/wav"
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn build_ssml(text: &str, voice: &VoiceIdentity) -> String {
    format!(
        "<speak version='1.0' xml:lang='{locale}'><voice xml:lang='{locale}' name='{name}'>{text}</voice></speak>",
        locale = voice.locale,
        name = voice.name,
        text = escape_xml(text),
    )
}

#[async_trait]
impl TextToSpeech for AzureNeuralSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceIdentity) -> Result<SynthesizedAudio> {
        if text.trim().is_empty() {
            return Err(Error::InvalidRequest("nothing to synthesize".to_string()));
        }

        let response = self
            .client
            .post(&self.url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("X-Microsoft-OutputFormat", &self.config.output_format)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header(reqwest::header::USER_AGENT, "kisan-voice")
            .body(build_ssml(text, voice))
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
            return Err(Error::EmptyResponse("Azure returned no audio".to_string()));
        }

        tracing::debug!(voice = %voice.name, bytes = bytes.len(), "Azure synthesis complete");

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            mime_type: self.mime_type().to_string(),
            voice_id: voice.name.clone(),
        })
    }

    fn model_name(&self) -> &str {
        "azure-neural"
    }
}
