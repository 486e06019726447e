//! Append-only run log
//!
//! One JSON line per finished run in `<dir>/runs_YYYYMMDD.jsonl`. Runs hand
//! records to a [`RunLogSink`] that never blocks; a single writer task owns
//! the files. [`RunLog::shutdown`] closes the channel and waits until every
//! record queued before it is on disk.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::result::{ErrorCategory, Fallback, Stage};
use crate::timing::StageTiming;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed { stage: Stage, category: ErrorCategory },
    /// Run future dropped or cancelled before finishing
    CancelledByCaller { stage: Option<Stage> },
}

/// One persisted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
    pub language: Option<String>,
    /// Set when a declared language overrode a different detected one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    pub stages: Vec<StageTiming>,
    pub total_ms: u64,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<Fallback>,
    pub outcome: RunOutcome,
}

/// Cloneable handle that queues records for the writer task
#[derive(Debug, Clone)]
pub struct RunLogSink {
    tx: mpsc::UnboundedSender<RunRecord>,
}

impl RunLogSink {
    pub fn record(&self, record: RunRecord) {
        if self.tx.send(record).is_err() {
            tracing::debug!("Run log closed, record dropped");
        }
    }
}

/// Owner of the writer task
pub struct RunLog {
    sink: RunLogSink,
    stop: CancellationToken,
    writer: JoinHandle<()>,
}

impl RunLog {
    /// Create `dir` if needed and start the writer task
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();
        let writer = tokio::spawn(write_loop(dir.clone(), rx, stop.clone()));

        tracing::info!(dir = %dir.display(), "Run log opened");

        Ok(Self {
            sink: RunLogSink { tx },
            stop,
            writer,
        })
    }

    pub fn sink(&self) -> RunLogSink {
        self.sink.clone()
    }

    /// Stop accepting records and flush everything queued so far
    ///
    /// Sinks still held elsewhere stay usable but their records are dropped.
    pub async fn shutdown(self) {
        let RunLog { sink, stop, writer } = self;
        drop(sink);
        stop.cancel();
        if let Err(e) = writer.await {
            tracing::error!(error = %e, "Run log writer task failed");
        }
    }
}

/// Path of the log file for a given day
pub fn file_for(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("runs_{}.jsonl", day.format("%Y%m%d")))
}

async fn write_loop(
    dir: PathBuf,
    mut rx: mpsc::UnboundedReceiver<RunRecord>,
    stop: CancellationToken,
) {
    let mut current: Option<(NaiveDate, File)> = None;
    let mut closing = false;

    loop {
        let next = tokio::select! {
            record = rx.recv() => record,
            _ = stop.cancelled(), if !closing => {
                // Queued records are still delivered after close
                rx.close();
                closing = true;
                continue;
            }
        };
        let Some(record) = next else { break };
        let day = record.timestamp.date_naive();

        if current.as_ref().map(|(d, _)| *d) != Some(day) {
            if let Some((_, mut old)) = current.take() {
                let _ = old.flush().await;
            }
            let path = file_for(&dir, day);
            match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(file) => current = Some((day, file)),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Cannot open run log");
                    continue;
                }
            }
        }

        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Cannot serialize run record");
                continue;
            }
        };
        line.push(b'\n');

        if let Some((_, file)) = current.as_mut() {
            if let Err(e) = file.write_all(&line).await {
                tracing::error!(error = %e, "Run log write failed");
            } else if let Err(e) = file.flush().await {
                tracing::error!(error = %e, "Run log flush failed");
            }
        }
    }

    if let Some((_, file)) = current {
        let _ = file.sync_all().await;
    }
    tracing::info!("Run log closed");
}
