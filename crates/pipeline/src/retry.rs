//! Retry executor with fixed backoff tables
//!
//! Every external call in a run goes through [`RetryExecutor::run`]. The
//! executor knows nothing about providers: whether an error deserves another
//! attempt is decided by the policy's classifier.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use kisan_voice_config::StageRetryConfig;
use kisan_voice_core::Error;

use crate::result::Stage;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    Retryable,
    Terminal,
}

pub type Classifier = fn(&Error) -> Retryability;

/// Rate limits, 5xx, timeouts, network failures and empty answers retry;
/// everything else is terminal.
pub fn default_classifier(err: &Error) -> Retryability {
    if err.is_transient() {
        Retryability::Retryable
    } else {
        Retryability::Terminal
    }
}

/// Backoff table, attempt timeout and classifier for one stage kind
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
    attempt_timeout: Duration,
    classifier: Classifier,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>, attempt_timeout: Duration) -> Self {
        Self {
            delays,
            attempt_timeout,
            classifier: default_classifier,
        }
    }

    /// Single attempt, no backoff
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self::new(Vec::new(), attempt_timeout)
    }

    pub fn from_config(config: &StageRetryConfig) -> Self {
        Self::new(config.delays(), config.attempt_timeout())
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Longest a stage can take: every attempt times out and every pause is taken
    pub fn worst_case(&self) -> Duration {
        self.attempt_timeout * self.max_attempts() as u32 + self.delays.iter().sum::<Duration>()
    }

    /// Pause after the given 1-based attempt, if another attempt follows
    pub fn delay_after(&self, attempt: usize) -> Option<Duration> {
        attempt.checked_sub(1).and_then(|i| self.delays.get(i)).copied()
    }

    pub fn classify(&self, err: &Error) -> Retryability {
        (self.classifier)(err)
    }
}

/// Result of running a stage operation, or of one attempt of it
#[derive(Debug)]
pub enum StageOutcome<T> {
    Success {
        value: T,
        attempts: usize,
        elapsed: Duration,
    },
    /// Attempt failed and another one will follow
    RetryableFailure {
        cause: Error,
        attempt: usize,
        elapsed: Duration,
    },
    TerminalFailure {
        cause: Error,
        attempts: usize,
        elapsed: Duration,
        /// The last failure was retryable but no attempts were left
        exhausted: bool,
    },
}

/// Failure half of [`StageOutcome`]
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub cause: Error,
    pub attempts: usize,
    pub elapsed: Duration,
    /// The last failure was classified retryable
    pub retryable: bool,
}

impl<T> StageOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            Self::Success { attempts, .. } | Self::TerminalFailure { attempts, .. } => *attempts,
            Self::RetryableFailure { attempt, .. } => *attempt,
        }
    }

    pub fn into_result(self) -> Result<T, StageFailure> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::RetryableFailure {
                cause,
                attempt,
                elapsed,
            } => Err(StageFailure {
                cause,
                attempts: attempt,
                elapsed,
                retryable: true,
            }),
            Self::TerminalFailure {
                cause,
                attempts,
                elapsed,
                exhausted,
            } => Err(StageFailure {
                cause,
                attempts,
                elapsed,
                retryable: exhausted,
            }),
        }
    }
}

/// Receives one event per attempt
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, stage: Stage, outcome: &StageOutcome<()>);
}

/// Runs stage operations under a [`RetryPolicy`]
#[derive(Clone, Default)]
pub struct RetryExecutor {
    observer: Option<std::sync::Arc<dyn AttemptObserver>>,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: std::sync::Arc<dyn AttemptObserver>) -> Self {
        Self {
            observer: Some(observer),
        }
    }

    /// Run `operation` until it succeeds, fails terminally, runs out of
    /// attempts or `cancel` fires
    ///
    /// The returned outcome is always `Success` or `TerminalFailure`.
    /// Cancellation is checked before each attempt and races the attempt
    /// and the backoff sleep; it yields `TerminalFailure(Error::Cancelled)`.
    pub async fn run<T, F, Fut>(
        &self,
        stage: Stage,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> StageOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let start = Instant::now();
        let max_attempts = policy.max_attempts();
        let timeout_ms = policy.attempt_timeout.as_millis() as u64;
        let mut attempt = 0usize;

        loop {
            attempt += 1;

            if cancel.is_cancelled() {
                return self.cancelled(stage, attempt - 1, start);
            }

            let attempt_start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                r = tokio::time::timeout(policy.attempt_timeout, operation()) => {
                    r.unwrap_or(Err(Error::Timeout(timeout_ms)))
                }
            };
            let attempt_elapsed = attempt_start.elapsed();

            let cause = match result {
                Ok(value) => {
                    tracing::debug!(
                        stage = %stage,
                        attempt,
                        elapsed_ms = attempt_elapsed.as_millis() as u64,
                        "Stage attempt succeeded"
                    );
                    self.observe(
                        stage,
                        StageOutcome::Success {
                            value: (),
                            attempts: attempt,
                            elapsed: attempt_elapsed,
                        },
                    );
                    return StageOutcome::Success {
                        value,
                        attempts: attempt,
                        elapsed: start.elapsed(),
                    };
                }
                Err(Error::Cancelled) => return self.cancelled(stage, attempt, start),
                Err(cause) => cause,
            };

            let retryable = policy.classify(&cause) == Retryability::Retryable;
            let delay = if retryable { policy.delay_after(attempt) } else { None };

            let Some(delay) = delay else {
                tracing::warn!(
                    stage = %stage,
                    attempt,
                    max_attempts,
                    elapsed_ms = attempt_elapsed.as_millis() as u64,
                    error = %cause,
                    exhausted = retryable,
                    "Stage failed"
                );
                let outcome = StageOutcome::TerminalFailure {
                    cause,
                    attempts: attempt,
                    elapsed: start.elapsed(),
                    exhausted: retryable,
                };
                self.observe_failure(stage, &outcome, attempt_elapsed);
                return outcome;
            };

            tracing::warn!(
                stage = %stage,
                attempt,
                max_attempts,
                elapsed_ms = attempt_elapsed.as_millis() as u64,
                retry_in_ms = delay.as_millis() as u64,
                error = %cause,
                "Stage attempt failed, retrying"
            );
            self.observe(
                stage,
                StageOutcome::RetryableFailure {
                    cause,
                    attempt,
                    elapsed: attempt_elapsed,
                },
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(stage, attempt, start),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancelled<T>(&self, stage: Stage, attempts: usize, start: Instant) -> StageOutcome<T> {
        tracing::info!(stage = %stage, attempts, "Stage cancelled by caller");
        StageOutcome::TerminalFailure {
            cause: Error::Cancelled,
            attempts,
            elapsed: start.elapsed(),
            exhausted: false,
        }
    }

    fn observe(&self, stage: Stage, outcome: StageOutcome<()>) {
        if let Some(observer) = &self.observer {
            observer.on_attempt(stage, &outcome);
        }
    }

    fn observe_failure<T>(&self, stage: Stage, outcome: &StageOutcome<T>, attempt_elapsed: Duration) {
        if let StageOutcome::TerminalFailure {
            cause,
            attempts,
            exhausted,
            ..
        } = outcome
        {
            self.observe(
                stage,
                StageOutcome::TerminalFailure {
                    cause: cause.clone(),
                    attempts: *attempts,
                    elapsed: attempt_elapsed,
                    exhausted: *exhausted,
                },
            );
        }
    }
}
