//! Observability Metrics
//!
//! Prometheus metrics for requests, pipeline runs and stage attempts.

use std::sync::OnceLock;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use kisan_voice_pipeline::{retry::AttemptObserver, PipelineError, PipelineResult, Stage, StageOutcome};

/// Global Prometheus handle
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder
///
/// Must be called once at startup before recording any metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_default_metrics();
    METRICS_HANDLE.get_or_init(|| handle.clone());
    Ok(handle)
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

fn register_default_metrics() {
    for endpoint in ["process_voice", "test_transcribe", "test_advise", "test_synthesize", "telegram"] {
        counter!("kisan_voice_requests_total", "endpoint" => endpoint).absolute(0);
    }
    counter!("kisan_voice_runs_total", "outcome" => "completed").absolute(0);
    counter!("kisan_voice_fallbacks_total", "kind" => "optimization_skipped").absolute(0);
    counter!("kisan_voice_fallbacks_total", "kind" => "voice_substituted").absolute(0);
}

pub fn record_request(endpoint: &'static str) {
    counter!("kisan_voice_requests_total", "endpoint" => endpoint).increment(1);
}

/// Record a completed run: outcome, fallbacks, per-stage and total latency
pub fn record_run(result: &PipelineResult) {
    counter!("kisan_voice_runs_total", "outcome" => "completed").increment(1);
    for fallback in &result.fallbacks {
        counter!("kisan_voice_fallbacks_total", "kind" => fallback.label()).increment(1);
    }
    for timing in &result.timings.stages {
        histogram!("kisan_voice_stage_duration_seconds", "stage" => timing.stage.as_str())
            .record(timing.duration.as_secs_f64());
    }
    histogram!("kisan_voice_run_duration_seconds").record(result.timings.total.as_secs_f64());
    counter!("kisan_voice_runs_by_language_total", "language" => result.language.clone()).increment(1);
}

/// Record a failed run by stage and category
pub fn record_failure(err: &PipelineError) {
    counter!(
        "kisan_voice_runs_total",
        "outcome" => "failed",
        "stage" => err.stage.as_str(),
        "category" => err.category.as_str()
    )
    .increment(1);
    histogram!("kisan_voice_run_duration_seconds").record(err.elapsed.as_secs_f64());
}

/// Counts every stage attempt the retry executor makes
#[derive(Debug, Default)]
pub struct MetricsObserver;

impl AttemptObserver for MetricsObserver {
    fn on_attempt(&self, stage: Stage, outcome: &StageOutcome<()>) {
        let result = match outcome {
            StageOutcome::Success { .. } => "success",
            StageOutcome::RetryableFailure { .. } => "retry",
            StageOutcome::TerminalFailure { .. } => "failure",
        };
        counter!(
            "kisan_voice_stage_attempts_total",
            "stage" => stage.as_str(),
            "result" => result
        )
        .increment(1);
    }
}

/// Prometheus-formatted metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match get_metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("process_voice");
        MetricsObserver.on_attempt(
            Stage::Synthesize,
            &StageOutcome::RetryableFailure {
                cause: kisan_voice_core::Error::Timeout(45_000),
                attempt: 1,
                elapsed: Duration::from_secs(45),
            },
        );
    }
}
