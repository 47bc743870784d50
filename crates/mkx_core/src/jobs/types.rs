//! Job queue types and data structures.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::params::ExtractionParameters;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell jobs apart in logs
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Lifecycle state of a job.
///
/// `Ready -> Running -> {Done | Error | Aborted}`. Terminal jobs can be
/// reset to `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Ready,
    Running,
    Done,
    Error(String),
    Aborted,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Error(_) | JobState::Aborted)
    }

    /// Get display string for UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Ready => "Ready",
            JobState::Running => "Running",
            JobState::Done => "Done",
            JobState::Error(_) => "Error",
            JobState::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Error(msg) => write!(f, "Error: {}", msg),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A single job in the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub parameters: ExtractionParameters,
    pub state: JobState,
    /// Per-job progress, 0..=100.
    pub progress: u8,
    pub created_at: DateTime<Local>,
}

impl Job {
    pub fn new(parameters: ExtractionParameters) -> Self {
        Self {
            id: JobId::new(),
            parameters,
            state: JobState::Ready,
            progress: 0,
            created_at: Local::now(),
        }
    }

    /// First three segment names, then how many more there are.
    pub fn track_summary(&self) -> String {
        let segments = self.parameters.segments();
        let mut summary = segments
            .iter()
            .take(3)
            .map(|s| s.display_name())
            .collect::<Vec<_>>()
            .join(", ");
        if segments.len() > 3 {
            summary.push_str(&format!(" +{} more", segments.len() - 3));
        }
        summary
    }

    pub fn status_text(&self) -> String {
        self.state.to_string()
    }

    pub fn source_file(&self) -> &std::path::Path {
        self.parameters.source_file()
    }
}

/// Counts of jobs per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub ready: usize,
    pub running: usize,
    pub done: usize,
    pub error: usize,
    pub aborted: usize,
}

impl QueueSummary {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut summary = Self::default();
        for job in jobs {
            match job.state {
                JobState::Ready => summary.ready += 1,
                JobState::Running => summary.running += 1,
                JobState::Done => summary.done += 1,
                JobState::Error(_) => summary.error += 1,
                JobState::Aborted => summary.aborted += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.ready + self.running + self.done + self.error + self.aborted
    }
}

impl fmt::Display for QueueSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} failed, {} aborted",
            self.done, self.error, self.aborted
        )?;
        if self.ready > 0 {
            write!(f, ", {} not started", self.ready)?;
        }
        Ok(())
    }
}

/// Terminal result of one job, yielded by [`QueueRun`](super::QueueRun).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub state: JobState,
    /// Files written by the job (kept even when aborted).
    pub outputs: Vec<PathBuf>,
}

/// Events published by the queue.
///
/// Events of one job are delivered before any event of the next job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    JobStateChanged { job_id: JobId, state: JobState },
    /// Per-job progress, 0..=100.
    JobProgress { job_id: JobId, percent: u8 },
    TrackStarted { job_id: JobId, name: String },
    /// Aggregate progress: jobs finished in this run out of jobs selected.
    QueueProgress { completed: usize, total: usize },
    QueueFinished(QueueSummary),
}

/// Subscriber for queue events. Called from the thread driving the queue.
pub type QueueCallback = Box<dyn Fn(&QueueEvent) + Send + Sync>;

/// Errors from queue operations.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job {id} is running")]
    JobRunning { id: JobId },

    #[error("Job {id} not found")]
    NotFound { id: JobId },

    #[error("The queue is already running")]
    AlreadyRunning,

    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid job list: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        QueueError::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
