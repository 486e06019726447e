//! Provider selection
//!
//! Builds the orchestrator once at startup from configuration. The advisor
//! and the optimizer always run on Gemini; the transcriber and synthesizer
//! are chosen by `providers.stt` / `providers.tts`.

use std::sync::Arc;

use kisan_voice_config::{Settings, SttProvider, TtsProvider};
use kisan_voice_core::{Error, SpeechToText, TextToSpeech};
use kisan_voice_llm::{GeminiAdvisor, GeminiClient, GeminiRomanizer, GeminiTranscriber, GenerativeBackend};
use kisan_voice_pipeline::{
    AzureNeuralSynthesizer, ElevenLabsSynthesizer, LanguageRouter, PipelineOrchestrator, RetryExecutor,
    RunLogSink, WhisperApiTranscriber,
};

use crate::metrics::MetricsObserver;

/// Build the orchestrator for the configured providers
///
/// Fails if credentials are missing or if the transcriber can report a
/// language the voice router has no route for.
pub fn build_orchestrator(settings: &Settings, run_log: Option<RunLogSink>) -> Result<PipelineOrchestrator, Error> {
    let providers = &settings.providers;
    let gemini: Arc<dyn GenerativeBackend> = Arc::new(GeminiClient::new(providers.gemini.clone())?);

    let stt: Arc<dyn SpeechToText> = match providers.stt {
        SttProvider::Gemini => Arc::new(GeminiTranscriber::new(gemini.clone())),
        SttProvider::Whisper => Arc::new(WhisperApiTranscriber::new(providers.whisper.clone())?),
    };

    let tts: Arc<dyn TextToSpeech> = match providers.tts {
        TtsProvider::ElevenLabs => Arc::new(ElevenLabsSynthesizer::new(providers.elevenlabs.clone())?),
        TtsProvider::Azure => Arc::new(AzureNeuralSynthesizer::new(providers.azure.clone())?),
    };

    let router = LanguageRouter::new(settings.pipeline.voice_gender);
    router.validate_coverage(stt.supported_languages())?;

    let mut builder = PipelineOrchestrator::builder()
        .config(&settings.pipeline)
        .router(router)
        .stt(stt)
        .advisor(Arc::new(GeminiAdvisor::new(gemini.clone())))
        .tts(tts)
        .executor(RetryExecutor::with_observer(Arc::new(MetricsObserver)));

    if settings.pipeline.optimize_enabled {
        builder = builder.optimizer(Arc::new(GeminiRomanizer::new(gemini)));
    }
    if let Some(sink) = run_log {
        builder = builder.run_log(sink);
    }

    let orchestrator = builder.build()?;
    tracing::info!(
        stt = ?providers.stt,
        tts = ?providers.tts,
        optimize = settings.pipeline.optimize_enabled,
        models = ?orchestrator.stage_models(),
        "Pipeline orchestrator ready"
    );
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kisan_voice_pipeline::Stage;

    fn settings_with_keys() -> Settings {
        let mut settings = Settings::default();
        settings.providers.gemini.api_key = Some("g".to_string());
        settings.providers.elevenlabs.api_key = Some("e".to_string());
        settings.providers.whisper.api_key = Some("w".to_string());
        settings.providers.azure.api_key = Some("a".to_string());
        settings
    }

    #[test]
    fn test_default_providers() {
        let orchestrator = build_orchestrator(&settings_with_keys(), None).unwrap();
        let models = orchestrator.stage_models();
        assert_eq!(models[0], (Stage::Transcribe, "gemini-2.0-flash"));
        assert_eq!(models.last(), Some(&(Stage::Synthesize, "eleven_multilingual_v2")));
        assert!(models.iter().any(|(stage, _)| *stage == Stage::Optimize));
    }

    #[test]
    fn test_whisper_and_azure() {
        let mut settings = settings_with_keys();
        settings.providers.stt = SttProvider::Whisper;
        settings.providers.tts = TtsProvider::Azure;
        settings.pipeline.optimize_enabled = false;

        let orchestrator = build_orchestrator(&settings, None).unwrap();
        assert_eq!(
            orchestrator.stage_models(),
            vec![
                (Stage::Transcribe, "whisper-1"),
                (Stage::Advise, "gemini-2.0-flash"),
                (Stage::Synthesize, "azure-neural"),
            ]
        );
    }

    #[test]
    fn test_missing_gemini_key() {
        let mut settings = settings_with_keys();
        settings.providers.gemini.api_key = None;
        assert!(matches!(build_orchestrator(&settings, None), Err(Error::Config(_))));
    }
}
