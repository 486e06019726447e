//! Pipeline orchestrator
//!
//! Sequences one voice request through the stage adapters:
//!
//! ```text
//! audio ─► Transcribe ─► Advise ─► [Optimize] ─► route voice ─► Synthesize ─► audio
//! ```
//!
//! Every stage call goes through the [`RetryExecutor`] with that stage's
//! [`RetryPolicy`]. Stage order is driven by the [`RunState`] machine; the
//! orchestrator only performs the call the current state asks for.
//!
//! A run owns its [`TimingRecorder`] and state and shares nothing mutable
//! with other runs, so one orchestrator serves any number of concurrent
//! requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use kisan_voice_config::{PipelineConfig, RetryConfig};
use kisan_voice_core::{
    Advisor, Advisory, AudioPayload, Error, OptimizedText, SpeechToText, SynthesizedAudio,
    TextOptimizer, TextToSpeech, Transcript, VoiceRequest, VoiceSelection,
};

use crate::result::{ErrorCategory, Fallback, PipelineError, PipelineResult, Stage};
use crate::retry::{RetryExecutor, RetryPolicy, StageFailure};
use crate::router::LanguageRouter;
use crate::run_log::{RunLogSink, RunOutcome, RunRecord};
use crate::state::{PipelineVariant, RunState, StepResult};
use crate::timing::{RunTimings, TimingRecorder};

/// Retry policy per stage
#[derive(Debug, Clone)]
pub struct StagePolicies {
    pub transcribe: RetryPolicy,
    pub advise: RetryPolicy,
    pub optimize: RetryPolicy,
    pub synthesize: RetryPolicy,
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl StagePolicies {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            transcribe: RetryPolicy::from_config(&config.transcribe),
            advise: RetryPolicy::from_config(&config.advise),
            optimize: RetryPolicy::from_config(&config.optimize),
            synthesize: RetryPolicy::from_config(&config.synthesize),
        }
    }

    /// Same policy for every stage
    pub fn uniform(policy: RetryPolicy) -> Self {
        Self {
            transcribe: policy.clone(),
            advise: policy.clone(),
            optimize: policy.clone(),
            synthesize: policy,
        }
    }

    pub fn for_stage(&self, stage: Stage) -> &RetryPolicy {
        match stage {
            Stage::Transcribe => &self.transcribe,
            Stage::Advise => &self.advise,
            Stage::Optimize => &self.optimize,
            Stage::Synthesize => &self.synthesize,
        }
    }
}

/// Map a stage failure to the category reported to callers
fn categorize(failure: &StageFailure) -> ErrorCategory {
    match failure.cause {
        Error::Cancelled => ErrorCategory::CancelledByCaller,
        _ if failure.retryable => ErrorCategory::RetryableUpstream,
        _ => ErrorCategory::TerminalUpstream,
    }
}

/// Per-run bookkeeping
///
/// If the run future is dropped before an outcome is recorded, the guard
/// logs the run as cancelled at whatever stage it had reached.
struct RunTracker {
    correlation_id: String,
    timings: TimingRecorder,
    state: RunState,
    variant: PipelineVariant,
    language: Option<String>,
    detected_language: Option<String>,
    fallbacks: Vec<Fallback>,
    sink: Option<RunLogSink>,
    finished: bool,
}

impl RunTracker {
    fn new(correlation_id: &str, variant: PipelineVariant, sink: Option<RunLogSink>) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            timings: TimingRecorder::new(),
            state: RunState::Received,
            variant,
            language: None,
            detected_language: None,
            fallbacks: Vec::new(),
            sink,
            finished: false,
        }
    }

    fn advance(&mut self, step: StepResult) {
        let next = self.state.advance(step, &self.variant);
        if next != self.state {
            tracing::trace!(
                correlation_id = %self.correlation_id,
                from = ?self.state,
                to = ?next,
                "Run state changed"
            );
        }
        self.state = next;
    }

    fn record(&mut self, outcome: RunOutcome) {
        self.finished = true;
        let Some(sink) = &self.sink else { return };
        let elapsed = self.timings.elapsed();
        sink.record(RunRecord {
            timestamp: chrono::Utc::now(),
            correlation_id: self.correlation_id.clone(),
            language: self.language.clone(),
            detected_language: self.detected_language.clone(),
            stages: self.timings.snapshot(),
            total_ms: elapsed.as_millis() as u64,
            fallback: !self.fallbacks.is_empty(),
            fallbacks: self.fallbacks.clone(),
            outcome,
        });
    }

    /// Apply a failing step and close the run
    fn abort(&mut self, step: StepResult, detail: impl Into<String>) -> PipelineError {
        let current = self.state.stage().unwrap_or(Stage::Transcribe);
        self.advance(step);
        let (stage, category) = match self.state {
            RunState::Failed { stage, category } => (stage, category),
            _ => (current, ErrorCategory::TerminalUpstream),
        };

        let outcome = if category == ErrorCategory::CancelledByCaller {
            RunOutcome::CancelledByCaller { stage: Some(stage) }
        } else {
            RunOutcome::Failed { stage, category }
        };
        self.record(outcome);

        let err = PipelineError::new(self.correlation_id.clone(), stage, category, detail)
            .with_timings(self.timings.elapsed(), self.timings.snapshot());

        if err.is_cancelled() {
            tracing::info!(correlation_id = %err.correlation_id, stage = %stage, "Run cancelled by caller");
        } else {
            tracing::warn!(
                correlation_id = %err.correlation_id,
                stage = %stage,
                category = %category,
                elapsed_ms = err.elapsed.as_millis() as u64,
                detail = %err.detail,
                "Run failed"
            );
        }
        err
    }

    fn complete(&mut self) -> RunTimings {
        self.record(RunOutcome::Completed);
        std::mem::take(&mut self.timings).finish()
    }
}

impl Drop for RunTracker {
    fn drop(&mut self) {
        if !self.finished {
            let stage = self.state.stage();
            tracing::info!(
                correlation_id = %self.correlation_id,
                stage = stage.map(|s| s.as_str()).unwrap_or("none"),
                "Run dropped before completion"
            );
            self.record(RunOutcome::CancelledByCaller { stage });
        }
    }
}

/// Voice pipeline orchestrator
///
/// Cheap to clone; clones share adapters and configuration.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    stt: Arc<dyn SpeechToText>,
    advisor: Arc<dyn Advisor>,
    optimizer: Option<Arc<dyn TextOptimizer>>,
    tts: Arc<dyn TextToSpeech>,
    router: Arc<LanguageRouter>,
    policies: Arc<StagePolicies>,
    variant: PipelineVariant,
    min_confidence: Option<f32>,
    executor: RetryExecutor,
    run_log: Option<RunLogSink>,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("stt", &self.stt.model_name())
            .field("advisor", &self.advisor.model_name())
            .field("optimizer", &self.optimizer.as_ref().map(|o| o.model_name()))
            .field("tts", &self.tts.model_name())
            .field("variant", &self.variant)
            .finish()
    }
}

impl PipelineOrchestrator {
    pub fn builder() -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder::default()
    }

    pub fn router(&self) -> &LanguageRouter {
        &self.router
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    /// Model name behind each configured stage
    pub fn stage_models(&self) -> Vec<(Stage, &str)> {
        let mut models = vec![
            (Stage::Transcribe, self.stt.model_name()),
            (Stage::Advise, self.advisor.model_name()),
        ];
        if let Some(optimizer) = &self.optimizer {
            models.push((Stage::Optimize, optimizer.model_name()));
        }
        models.push((Stage::Synthesize, self.tts.model_name()));
        models
    }

    /// Upper bound on one full run under the configured retry policies
    pub fn worst_case_duration(&self) -> Duration {
        let mut stages = vec![Stage::Transcribe, Stage::Advise];
        if self.variant.optimize {
            stages.push(Stage::Optimize);
        }
        stages.push(Stage::Synthesize);
        stages
            .into_iter()
            .map(|stage| self.policies.for_stage(stage).worst_case())
            .sum()
    }

    /// Run a request to completion with no external cancellation
    pub async fn run(&self, request: VoiceRequest) -> Result<PipelineResult, PipelineError> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Run a request; cancelling `cancel` aborts the in-flight attempt or
    /// backoff and fails the run with [`ErrorCategory::CancelledByCaller`]
    pub async fn run_with_cancel(
        &self,
        request: VoiceRequest,
        cancel: CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let mut run = RunTracker::new(request.correlation_id(), self.variant, self.run_log.clone());
        let declared = request.declared_language().map(str::to_string);
        run.language = declared.clone();

        tracing::info!(
            correlation_id = %run.correlation_id,
            audio_bytes = request.audio().len(),
            format = ?request.audio().format,
            declared_language = declared.as_deref().unwrap_or("auto"),
            "Voice run started"
        );

        if cancel.is_cancelled() {
            return Err(run.abort(
                StepResult::Failed(ErrorCategory::CancelledByCaller),
                Error::Cancelled.to_string(),
            ));
        }
        run.advance(StepResult::Started);

        // Transcribe
        let mut transcript = match self
            .call_stage(&mut run, Stage::Transcribe, &cancel, || {
                self.stt.transcribe(request.audio(), declared.as_deref())
            })
            .await
        {
            Ok(transcript) => transcript,
            Err(failure) => {
                return Err(run.abort(StepResult::Failed(categorize(&failure)), failure.cause.to_string()))
            }
        };

        if transcript.is_blank() {
            return Err(run.abort(StepResult::EmptyTranscript, "transcript is blank"));
        }
        if let (Some(floor), Some(confidence)) = (self.min_confidence, transcript.confidence) {
            if confidence < floor {
                return Err(run.abort(
                    StepResult::EmptyTranscript,
                    format!("transcript confidence {:.2} below {:.2}", confidence, floor),
                ));
            }
        }
        run.advance(StepResult::Succeeded);

        // Declared language wins over the detected one; transcript, advisory
        // and voice all carry the run language
        let detected_language = transcript.language.clone();
        let language = declared.unwrap_or_else(|| detected_language.clone());
        if language != detected_language {
            tracing::info!(
                correlation_id = %run.correlation_id,
                declared = %language,
                detected = %detected_language,
                "Declared language overrides detection"
            );
            transcript.language = language.clone();
            run.detected_language = Some(detected_language.clone());
        }
        run.language = Some(language.clone());

        // Advise
        let advisory = match self
            .call_stage(&mut run, Stage::Advise, &cancel, || {
                self.advisor.advise(&transcript.text, &language)
            })
            .await
        {
            Ok(advisory) => advisory,
            Err(failure) => {
                return Err(run.abort(StepResult::Failed(categorize(&failure)), failure.cause.to_string()))
            }
        };
        run.advance(StepResult::Succeeded);

        // Optimize (never fatal unless the caller is gone)
        let mut optimized = None;
        if run.state == RunState::Optimizing {
            match &self.optimizer {
                Some(optimizer) => {
                    match self
                        .call_stage(&mut run, Stage::Optimize, &cancel, || optimizer.optimize(&advisory))
                        .await
                    {
                        Ok(text) => {
                            optimized = Some(text);
                            run.advance(StepResult::Succeeded);
                        }
                        Err(failure) => {
                            let category = categorize(&failure);
                            if category == ErrorCategory::CancelledByCaller {
                                return Err(run.abort(StepResult::Failed(category), failure.cause.to_string()));
                            }
                            tracing::warn!(
                                correlation_id = %run.correlation_id,
                                error = %failure.cause,
                                attempts = failure.attempts,
                                "Optimization failed, speaking advisory text"
                            );
                            run.fallbacks.push(Fallback::OptimizationSkipped {
                                reason: failure.cause.kind().to_string(),
                            });
                            run.advance(StepResult::Failed(category));
                        }
                    }
                }
                None => run.advance(StepResult::Succeeded),
            }
        }

        // Route the voice; unmapped languages fail before any synthesis call
        let voice = match self.router.resolve_voice(&language) {
            Ok(voice) => voice,
            Err(e) => return Err(run.abort(StepResult::UnsupportedLanguage, e.to_string())),
        };
        if voice.substituted {
            tracing::info!(
                correlation_id = %run.correlation_id,
                requested = %voice.requested,
                voice = %voice.voice.name,
                "Using substitute voice"
            );
            run.fallbacks.push(Fallback::VoiceSubstituted {
                requested: voice.requested.clone(),
                voice_language: voice.voice.language.code().to_string(),
            });
        }

        // Synthesize
        let text = optimized
            .as_ref()
            .map(|o: &OptimizedText| o.text.as_str())
            .unwrap_or(&advisory.text);
        let audio = match self
            .call_stage(&mut run, Stage::Synthesize, &cancel, || {
                self.tts.synthesize(text, &voice.voice)
            })
            .await
        {
            Ok(audio) => audio,
            Err(failure) => {
                return Err(run.abort(StepResult::Failed(categorize(&failure)), failure.cause.to_string()))
            }
        };
        run.advance(StepResult::Succeeded);

        let timings = run.complete();
        let fallbacks = std::mem::take(&mut run.fallbacks);

        tracing::info!(
            correlation_id = %run.correlation_id,
            language = %language,
            voice = %voice.voice.name,
            total_ms = timings.total.as_millis() as u64,
            fallback = !fallbacks.is_empty(),
            audio_bytes = audio.bytes.len(),
            "Voice run completed"
        );

        Ok(PipelineResult {
            correlation_id: run.correlation_id.clone(),
            transcript,
            detected_language,
            advisory,
            optimized,
            audio,
            language,
            voice,
            fallbacks,
            timings,
        })
    }

    async fn call_stage<T, F, Fut>(
        &self,
        run: &mut RunTracker,
        stage: Stage,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, StageFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        run.timings.begin(stage);
        let outcome = self
            .executor
            .run(stage, self.policies.for_stage(stage), cancel, operation)
            .await;
        run.timings.end(stage);
        outcome.into_result()
    }

    /// Single stage outside a run: retried, timed, not persisted
    async fn single_stage<T, F, Fut>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut timings = TimingRecorder::new();
        timings.begin(stage);
        let outcome = self
            .executor
            .run(stage, self.policies.for_stage(stage), cancel, operation)
            .await;
        timings.end(stage);
        outcome.into_result().map_err(|failure| {
            PipelineError::new(
                uuid::Uuid::new_v4().to_string(),
                stage,
                categorize(&failure),
                failure.cause.to_string(),
            )
            .with_timings(timings.elapsed(), timings.snapshot())
        })
    }

    /// Transcription only, for diagnostics
    pub async fn transcribe_only(
        &self,
        audio: &AudioPayload,
        language_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Transcript, PipelineError> {
        self.single_stage(Stage::Transcribe, cancel, || self.stt.transcribe(audio, language_hint))
            .await
    }

    /// Advisory only, for diagnostics
    pub async fn advise_only(
        &self,
        query: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Advisory, PipelineError> {
        self.single_stage(Stage::Advise, cancel, || self.advisor.advise(query, language))
            .await
    }

    /// Route and synthesize text directly, for diagnostics
    pub async fn synthesize_only(
        &self,
        text: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<(SynthesizedAudio, VoiceSelection), PipelineError> {
        let voice = self.router.resolve_voice(language).map_err(|e| {
            PipelineError::new(
                uuid::Uuid::new_v4().to_string(),
                Stage::Synthesize,
                ErrorCategory::UnsupportedLanguage,
                e.to_string(),
            )
        })?;
        let audio = self
            .single_stage(Stage::Synthesize, cancel, || self.tts.synthesize(text, &voice.voice))
            .await?;
        Ok((audio, voice))
    }
}

/// Builder for [`PipelineOrchestrator`]
#[derive(Default)]
pub struct PipelineOrchestratorBuilder {
    stt: Option<Arc<dyn SpeechToText>>,
    advisor: Option<Arc<dyn Advisor>>,
    optimizer: Option<Arc<dyn TextOptimizer>>,
    tts: Option<Arc<dyn TextToSpeech>>,
    router: Option<LanguageRouter>,
    policies: Option<StagePolicies>,
    variant: PipelineVariant,
    min_confidence: Option<f32>,
    executor: RetryExecutor,
    run_log: Option<RunLogSink>,
}

impl PipelineOrchestratorBuilder {
    pub fn stt(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt = Some(stt);
        self
    }

    pub fn advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn optimizer(mut self, optimizer: Arc<dyn TextOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn tts(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.tts = Some(tts);
        self
    }

    pub fn router(mut self, router: LanguageRouter) -> Self {
        self.router = Some(router);
        self
    }

    pub fn policies(mut self, policies: StagePolicies) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn variant(mut self, variant: PipelineVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn min_confidence(mut self, floor: Option<f32>) -> Self {
        self.min_confidence = floor;
        self
    }

    pub fn executor(mut self, executor: RetryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn run_log(mut self, sink: RunLogSink) -> Self {
        self.run_log = Some(sink);
        self
    }

    /// Apply retry tables, variant, confidence floor and voice gender
    pub fn config(mut self, config: &PipelineConfig) -> Self {
        self.policies = Some(StagePolicies::from_config(&config.retry));
        self.variant = PipelineVariant {
            optimize: config.optimize_enabled,
        };
        self.min_confidence = config.min_transcript_confidence;
        self.router = Some(LanguageRouter::new(config.voice_gender));
        self
    }

    pub fn build(self) -> Result<PipelineOrchestrator, Error> {
        let missing = |what: &str| Error::Config(format!("pipeline has no {} adapter", what));

        let stt = self.stt.ok_or_else(|| missing("speech-to-text"))?;
        let advisor = self.advisor.ok_or_else(|| missing("advisor"))?;
        let tts = self.tts.ok_or_else(|| missing("text-to-speech"))?;
        if self.variant.optimize && self.optimizer.is_none() {
            return Err(missing("optimizer"));
        }

        Ok(PipelineOrchestrator {
            stt,
            advisor,
            optimizer: self.optimizer,
            tts,
            router: Arc::new(self.router.unwrap_or_default()),
            policies: Arc::new(self.policies.unwrap_or_default()),
            variant: self.variant,
            min_confidence: self.min_confidence,
            executor: self.executor,
            run_log: self.run_log,
        })
    }
}
