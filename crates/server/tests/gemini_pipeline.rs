//! Gemini transcription wired into the orchestrator with production retry tables
//!
//! Time is paused, so any backoff the executor takes shows up as elapsed time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use kisan_voice_core::{
    Advisor, Advisory, AudioFormat, AudioPayload, Result, SynthesizedAudio, TextToSpeech,
    VoiceGender, VoiceIdentity, VoiceRequest,
};
use kisan_voice_llm::{GeminiTranscriber, GenerationRequest, GenerativeBackend, LlmError};
use kisan_voice_pipeline::{
    ErrorCategory, LanguageRouter, PipelineOrchestrator, PipelineVariant, Stage, StagePolicies,
};

/// Gemini answering with no text, e.g. a blocked prompt or a silent clip
struct NoText {
    reason: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerativeBackend for NoText {
    async fn generate(&self, _request: &GenerationRequest) -> std::result::Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::Empty(self.reason.to_string()))
    }

    fn model_name(&self) -> &str {
        "gemini-no-text"
    }
}

#[derive(Default)]
struct CountingAdvisor {
    calls: AtomicUsize,
}

#[async_trait]
impl Advisor for CountingAdvisor {
    async fn advise(&self, query: &str, language: &str) -> Result<Advisory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Advisory::new(format!("advice: {}", query), language))
    }
    fn model_name(&self) -> &str {
        "counting-advisor"
    }
}

struct NullTts;

#[async_trait]
impl TextToSpeech for NullTts {
    async fn synthesize(&self, _text: &str, voice: &VoiceIdentity) -> Result<SynthesizedAudio> {
        Ok(SynthesizedAudio {
            bytes: vec![0xFF, 0xFB],
            mime_type: "audio/mpeg".to_string(),
            voice_id: voice.name.clone(),
        })
    }
    fn model_name(&self) -> &str {
        "null-tts"
    }
}

async fn run_with(reason: &'static str, language: Option<&str>) {
    let backend = Arc::new(NoText {
        reason,
        calls: AtomicUsize::new(0),
    });
    let advisor = Arc::new(CountingAdvisor::default());
    let orchestrator = PipelineOrchestrator::builder()
        .stt(Arc::new(GeminiTranscriber::new(backend.clone())))
        .advisor(advisor.clone())
        .tts(Arc::new(NullTts))
        .router(LanguageRouter::new(VoiceGender::Female))
        .variant(PipelineVariant { optimize: false })
        .policies(StagePolicies::default())
        .build()
        .unwrap();

    let request = VoiceRequest::new(AudioPayload::new(vec![0u8; 64], AudioFormat::Ogg))
        .with_language(language.map(str::to_string));

    let start = Instant::now();
    let err = orchestrator.run(request).await.unwrap_err();

    assert_eq!(err.stage, Stage::Transcribe);
    assert_eq!(err.category, ErrorCategory::EmptyTranscript);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1, "no speech must not be retried");
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(advisor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_clip_is_terminal_empty_transcript() {
    run_with("no candidates", None).await;
}

#[tokio::test(start_paused = true)]
async fn test_blocked_prompt_is_terminal_empty_transcript() {
    run_with("prompt blocked: SAFETY", Some("mr")).await;
}
