//! Job queue.
//!
//! This module provides:
//! - `JobQueue`: ordered jobs run one at a time through the extraction engine
//! - `Job`: one queued request plus its run state
//! - `QueueEvent`: state, progress and track notifications for subscribers
//! - Saving and best-effort restoring of the job list

mod persist;
mod queue;
mod types;

pub use persist::{JobRecord, PersistedParameters, RestoreReport};
pub use queue::{JobQueue, QueueRun};
pub use types::{
    Job, JobId, JobOutcome, JobState, QueueCallback, QueueError, QueueEvent, QueueResult,
    QueueSummary,
};
