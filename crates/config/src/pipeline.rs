//! Pipeline configuration: stage variant and per-stage retry tables

use serde::{Deserialize, Serialize};
use std::time::Duration;

use kisan_voice_core::VoiceGender;

use crate::ConfigError;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Run the TTS optimization (romanization) stage
    #[serde(default = "default_true")]
    pub optimize_enabled: bool,

    /// Preferred voice gender for synthesized answers
    #[serde(default)]
    pub voice_gender: VoiceGender,

    /// Transcripts below this confidence are treated as empty.
    /// Ignored when the provider reports no confidence.
    #[serde(default)]
    pub min_transcript_confidence: Option<f32>,

    /// Retry tables per stage kind
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            optimize_enabled: true,
            voice_gender: VoiceGender::default(),
            min_transcript_confidence: None,
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(floor) = self.min_transcript_confidence {
            if !(0.0..=1.0).contains(&floor) {
                return Err(ConfigError::InvalidValue {
                    field: "pipeline.min_transcript_confidence".to_string(),
                    message: format!("must be within 0.0..=1.0, got {}", floor),
                });
            }
        }
        self.retry.validate()
    }
}

/// Retry tables, one per stage kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_upstream_retry")]
    pub transcribe: StageRetryConfig,

    #[serde(default = "default_upstream_retry")]
    pub advise: StageRetryConfig,

    /// Optimization is optional, so it gets a short table: a slow retry here
    /// only delays an answer that can be spoken without it.
    #[serde(default = "default_optimize_retry")]
    pub optimize: StageRetryConfig,

    #[serde(default = "default_synthesize_retry")]
    pub synthesize: StageRetryConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transcribe: default_upstream_retry(),
            advise: default_upstream_retry(),
            optimize: default_optimize_retry(),
            synthesize: default_synthesize_retry(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, stage) in [
            ("transcribe", &self.transcribe),
            ("advise", &self.advise),
            ("optimize", &self.optimize),
            ("synthesize", &self.synthesize),
        ] {
            if stage.attempt_timeout_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("pipeline.retry.{}.attempt_timeout_ms", name),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Retry table for one stage kind
///
/// `delays_ms[k]` is the pause between attempt `k + 1` and attempt `k + 2`,
/// so a table with N delays allows N + 1 attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRetryConfig {
    #[serde(default)]
    pub delays_ms: Vec<u64>,

    /// Timeout for a single attempt, independent of the backoff delays
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
}

impl StageRetryConfig {
    pub fn new(delays_ms: Vec<u64>, attempt_timeout_ms: u64) -> Self {
        Self {
            delays_ms,
            attempt_timeout_ms,
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays_ms.iter().copied().map(Duration::from_millis).collect()
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn max_attempts(&self) -> usize {
        self.delays_ms.len() + 1
    }
}

fn default_attempt_timeout() -> u64 {
    60_000
}

/// 5s / 10s / 15s, as the upstream models recover from quota and overload
/// errors on that scale
fn default_upstream_retry() -> StageRetryConfig {
    StageRetryConfig::new(vec![5_000, 10_000, 15_000], default_attempt_timeout())
}

fn default_optimize_retry() -> StageRetryConfig {
    StageRetryConfig::new(vec![5_000], 30_000)
}

fn default_synthesize_retry() -> StageRetryConfig {
    StageRetryConfig::new(vec![5_000, 10_000, 15_000], 45_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables() {
        let retry = RetryConfig::default();
        assert_eq!(retry.advise.delays_ms, vec![5_000, 10_000, 15_000]);
        assert_eq!(retry.advise.max_attempts(), 4);
        assert_eq!(retry.optimize.max_attempts(), 2);
        assert_eq!(retry.transcribe.delays()[1], Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = PipelineConfig::default();
        config.retry.synthesize.attempt_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_confidence_floor_range() {
        let mut config = PipelineConfig::default();
        config.min_transcript_confidence = Some(1.5);
        assert!(config.validate().is_err());
        config.min_transcript_confidence = Some(0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "retry:\n  optimize:\n    delays_ms: []\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.optimize_enabled);
        assert_eq!(config.retry.optimize.max_attempts(), 1);
        assert_eq!(config.retry.optimize.attempt_timeout_ms, 60_000);
        assert_eq!(config.retry.advise.max_attempts(), 4);
    }
}
