//! Per-run stage timing

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::result::Stage;

/// Duration of one finished stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    /// Offset of the stage start from the run start
    #[serde(with = "millis")]
    pub started_at: Duration,
    #[serde(with = "millis")]
    pub duration: Duration,
}

/// Frozen timings of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTimings {
    pub stages: Vec<StageTiming>,
    #[serde(with = "millis")]
    pub total: Duration,
}

impl RunTimings {
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.stages.iter().find(|t| t.stage == stage).map(|t| t.duration)
    }
}

/// Stage start/end bookkeeping for a single run
///
/// Owned by one run and never shared. Calling `begin` twice for a stage or
/// `end` without `begin` is a bug in the caller and panics.
#[derive(Debug)]
pub struct TimingRecorder {
    run_start: Instant,
    open: Vec<(Stage, Instant)>,
    finished: Vec<StageTiming>,
}

impl Default for TimingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingRecorder {
    pub fn new() -> Self {
        Self {
            run_start: Instant::now(),
            open: Vec::new(),
            finished: Vec::new(),
        }
    }

    pub fn begin(&mut self, stage: Stage) {
        let seen = self.open.iter().any(|(s, _)| *s == stage)
            || self.finished.iter().any(|t| t.stage == stage);
        assert!(!seen, "stage {} begun twice", stage);
        self.open.push((stage, Instant::now()));
    }

    pub fn end(&mut self, stage: Stage) {
        let idx = self
            .open
            .iter()
            .position(|(s, _)| *s == stage)
            .unwrap_or_else(|| panic!("stage {} ended without begin", stage));
        let (_, started) = self.open.remove(idx);
        self.finished.push(StageTiming {
            stage,
            started_at: started.duration_since(self.run_start),
            duration: started.elapsed(),
        });
    }

    /// Finished stages, ordered by start
    pub fn snapshot(&self) -> Vec<StageTiming> {
        let mut stages = self.finished.clone();
        stages.sort_by_key(|t| t.started_at);
        stages
    }

    pub fn elapsed(&self) -> Duration {
        self.run_start.elapsed()
    }

    pub fn finish(self) -> RunTimings {
        RunTimings {
            stages: self.snapshot(),
            total: self.elapsed(),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stage_durations() {
        let mut recorder = TimingRecorder::new();

        recorder.begin(Stage::Transcribe);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        recorder.end(Stage::Transcribe);

        recorder.begin(Stage::Advise);
        tokio::time::sleep(Duration::from_millis(800)).await;
        recorder.end(Stage::Advise);

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].stage, Stage::Transcribe);
        assert_eq!(snapshot[0].duration, Duration::from_millis(1200));
        assert_eq!(snapshot[1].started_at, Duration::from_millis(1200));

        let timings = recorder.finish();
        assert_eq!(timings.total, Duration::from_millis(2000));
        assert_eq!(timings.get(Stage::Advise), Some(Duration::from_millis(800)));
        assert_eq!(timings.get(Stage::Synthesize), None);
    }

    #[test]
    fn test_open_stage_not_in_snapshot() {
        let mut recorder = TimingRecorder::new();
        recorder.begin(Stage::Transcribe);
        assert!(recorder.snapshot().is_empty());
    }

    #[test]
    #[should_panic(expected = "ended without begin")]
    fn test_end_without_begin_panics() {
        TimingRecorder::new().end(Stage::Advise);
    }

    #[test]
    #[should_panic(expected = "begun twice")]
    fn test_double_begin_panics() {
        let mut recorder = TimingRecorder::new();
        recorder.begin(Stage::Advise);
        recorder.end(Stage::Advise);
        recorder.begin(Stage::Advise);
    }

    #[test]
    fn test_serialized_as_millis() {
        let timing = StageTiming {
            stage: Stage::Synthesize,
            started_at: Duration::from_millis(10),
            duration: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(timing).unwrap();
        assert_eq!(json["stage"], "synthesize");
        assert_eq!(json["duration"], 1500);
    }
}
