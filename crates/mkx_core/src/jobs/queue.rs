//! Job queue: ordered jobs driven one at a time through the engine.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, MutexGuard};

use crate::abort::AbortController;
use crate::extraction::{ExtractionEngine, ExtractionEvent, ExtractionOutcome};
use crate::logging::DiagnosticLog;
use crate::params::ExtractionParameters;

use super::types::{
    Job, JobId, JobOutcome, JobState, QueueCallback, QueueError, QueueEvent, QueueResult,
    QueueSummary,
};

/// Ordered collection of jobs.
///
/// Jobs run strictly in queue order, one at a time. Callers may enqueue,
/// reset or remove jobs from any thread while the queue runs; the job list
/// is guarded by a lock that is never held while the engine runs or while
/// events are published.
pub struct JobQueue {
    pub(super) jobs: Mutex<Vec<Job>>,
    engine: ExtractionEngine,
    abort: AbortController,
    run_lock: Mutex<()>,
    callback: Option<QueueCallback>,
}

impl JobQueue {
    /// Create a queue driving the given engine.
    ///
    /// The queue shares the engine's abort controller.
    pub fn new(engine: ExtractionEngine) -> Self {
        let abort = engine.abort_controller().clone();
        Self {
            jobs: Mutex::new(Vec::new()),
            engine,
            abort,
            run_lock: Mutex::new(()),
            callback: None,
        }
    }

    /// Subscribe to queue events.
    pub fn with_callback(mut self, callback: QueueCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn abort_controller(&self) -> &AbortController {
        &self.abort
    }

    fn log(&self) -> &DiagnosticLog {
        self.engine.log()
    }

    pub(super) fn emit(&self, event: QueueEvent) {
        if let Some(ref cb) = self.callback {
            cb(&event);
        }
    }

    /// Queue a request.
    ///
    /// Returns `None` (and changes nothing) when an equal request is already
    /// waiting in `Ready` state.
    pub fn enqueue(&self, parameters: ExtractionParameters) -> Option<JobId> {
        let job = {
            let mut jobs = self.jobs.lock();
            if jobs
                .iter()
                .any(|j| j.state == JobState::Ready && j.parameters == parameters)
            {
                tracing::debug!(
                    "Skipping duplicate job for {}",
                    parameters.source_file().display()
                );
                return None;
            }
            let job = Job::new(parameters);
            jobs.push(job.clone());
            job
        };

        self.log().info(&format!(
            "Queued job {} for {}: {}",
            job.id,
            job.source_file().display(),
            job.track_summary()
        ));
        self.emit(QueueEvent::JobStateChanged {
            job_id: job.id,
            state: JobState::Ready,
        });
        Some(job.id)
    }

    /// Snapshot of all jobs in queue order.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().clone()
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.lock().iter().find(|j| j.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    pub fn summary(&self) -> QueueSummary {
        QueueSummary::from_jobs(self.jobs.lock().iter())
    }

    /// Put a terminal job back into `Ready`, clearing its progress.
    ///
    /// A job that is already `Ready` is left as is.
    pub fn reset(&self, id: JobId) -> QueueResult<()> {
        {
            let mut jobs = self.jobs.lock();
            let job = jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or(QueueError::NotFound { id })?;
            match job.state {
                JobState::Running => return Err(QueueError::JobRunning { id }),
                JobState::Ready => return Ok(()),
                _ => {
                    job.state = JobState::Ready;
                    job.progress = 0;
                }
            }
        }

        self.emit(QueueEvent::JobStateChanged {
            job_id: id,
            state: JobState::Ready,
        });
        Ok(())
    }

    /// Remove a job that is not running.
    pub fn remove(&self, id: JobId) -> QueueResult<Job> {
        let mut jobs = self.jobs.lock();
        let index = jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or(QueueError::NotFound { id })?;
        if jobs[index].state == JobState::Running {
            return Err(QueueError::JobRunning { id });
        }
        Ok(jobs.remove(index))
    }

    /// Remove every job. Refused while a job is running.
    pub fn clear(&self) -> QueueResult<()> {
        let mut jobs = self.jobs.lock();
        if let Some(running) = jobs.iter().find(|j| j.state == JobState::Running) {
            return Err(QueueError::JobRunning { id: running.id });
        }
        jobs.clear();
        Ok(())
    }

    /// Stop the running job after its current unit. Later jobs still run.
    pub fn abort_current(&self) {
        self.log().warn("Abort requested for the current job");
        self.abort.abort_current();
    }

    /// Stop the running job and start no further jobs.
    pub fn abort_all(&self) {
        self.log().warn("Abort requested for all remaining jobs");
        self.abort.abort_all();
    }

    /// Start processing `Ready` jobs.
    ///
    /// The returned iterator runs one job per `next()` call and yields its
    /// terminal outcome. Only one run may be active at a time.
    pub fn run(&self) -> QueueResult<QueueRun<'_>> {
        let guard = self.run_lock.try_lock().ok_or(QueueError::AlreadyRunning)?;
        self.abort.reset_all();

        let total = self.summary().ready;
        self.log().phase(&format!("Processing {} job(s)", total));

        Ok(QueueRun {
            queue: self,
            _guard: guard,
            completed: 0,
            total,
            halted: false,
            finished: false,
        })
    }

    /// Run every `Ready` job and return the final summary.
    pub fn run_to_end(&self) -> QueueResult<QueueSummary> {
        let run = self.run()?;
        run.for_each(drop);
        Ok(self.summary())
    }

    /// Run the queue on a dedicated worker thread.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<QueueResult<QueueSummary>> {
        thread::spawn(move || self.run_to_end())
    }

    /// Mark the first `Ready` job as running and return its parameters.
    fn start_next(&self) -> Option<(JobId, ExtractionParameters)> {
        let mut jobs = self.jobs.lock();
        let job = jobs.iter_mut().find(|j| j.state == JobState::Ready)?;
        job.state = JobState::Running;
        job.progress = 0;
        Some((job.id, job.parameters.clone()))
    }

    fn set_progress(&self, id: JobId, percent: u8) {
        if let Some(job) = self.jobs.lock().iter_mut().find(|j| j.id == id) {
            job.progress = percent;
        }
    }

    pub(super) fn finish(&self, id: JobId, state: JobState) {
        if let Some(job) = self.jobs.lock().iter_mut().find(|j| j.id == id) {
            if state == JobState::Done {
                job.progress = 100;
            }
            job.state = state;
        }
    }

    /// Run one job to a terminal state. Returns the outcome and whether
    /// the queue must stop.
    fn process(&self, id: JobId, params: &ExtractionParameters) -> (JobOutcome, bool) {
        self.abort.reset_current();
        self.emit(QueueEvent::JobStateChanged {
            job_id: id,
            state: JobState::Running,
        });
        self.log().section(&format!(
            "Job {}: {}",
            id,
            params.source_file().display()
        ));

        let on_event = |event: ExtractionEvent| match event {
            ExtractionEvent::Progress(percent) => {
                self.set_progress(id, percent);
                self.emit(QueueEvent::JobProgress { job_id: id, percent });
            }
            ExtractionEvent::TrackStarted(name) => {
                self.emit(QueueEvent::TrackStarted { job_id: id, name });
            }
        };

        let mut halt = false;
        let (state, outputs) = match self.engine.run(params, &on_event) {
            Ok(ExtractionOutcome::Completed { outputs }) => (JobState::Done, outputs),
            Ok(ExtractionOutcome::Aborted { completed, .. }) => (JobState::Aborted, completed),
            Err(e) => {
                self.log().error(&format!("Job {} failed: {}", id, e));
                if e.is_fatal() {
                    self.log().error("Stopping the queue: the extraction tool cannot run");
                    halt = true;
                }
                (JobState::Error(e.status_message()), Vec::new())
            }
        };

        self.finish(id, state.clone());
        if state == JobState::Done {
            self.emit(QueueEvent::JobProgress {
                job_id: id,
                percent: 100,
            });
        }
        self.emit(QueueEvent::JobStateChanged {
            job_id: id,
            state: state.clone(),
        });

        (
            JobOutcome {
                job_id: id,
                state,
                outputs,
            },
            halt,
        )
    }
}

/// An active run of the queue. See [`JobQueue::run`].
///
/// Dropping the iterator early leaves the remaining jobs `Ready`.
pub struct QueueRun<'a> {
    queue: &'a JobQueue,
    _guard: MutexGuard<'a, ()>,
    completed: usize,
    total: usize,
    halted: bool,
    finished: bool,
}

impl QueueRun<'_> {
    /// Jobs finished so far in this run.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Jobs selected for this run, including ones queued after it started.
    pub fn total(&self) -> usize {
        self.total
    }

    fn end(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let summary = self.queue.summary();
        if self.queue.abort.is_all_raised() {
            self.queue.log().warn("Queue aborted");
        }
        self.queue.log().success(&format!("Queue finished: {}", summary));
        self.queue.emit(QueueEvent::QueueFinished(summary));
    }
}

impl Iterator for QueueRun<'_> {
    type Item = JobOutcome;

    fn next(&mut self) -> Option<JobOutcome> {
        if self.finished {
            return None;
        }
        if self.halted || self.queue.abort.is_all_raised() {
            self.end();
            return None;
        }

        let Some((id, params)) = self.queue.start_next() else {
            self.end();
            return None;
        };
        if self.completed >= self.total {
            self.total = self.completed + 1;
        }

        let (outcome, halt) = self.queue.process(id, &params);
        self.halted = halt;
        self.completed += 1;
        self.queue.emit(QueueEvent::QueueProgress {
            completed: self.completed,
            total: self.total,
        });
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::EngineConfig;
    use crate::models::{Segment, TrackSegment, TrackType};
    use std::fs;
    use tempfile::tempdir;

    fn engine(tool: &std::path::Path) -> ExtractionEngine {
        ExtractionEngine::new(
            EngineConfig::default().with_mkvextract(tool),
            DiagnosticLog::default(),
            AbortController::new(),
        )
    }

    fn params(src: &std::path::Path, out: &std::path::Path, ids: &[u64]) -> ExtractionParameters {
        ExtractionParameters::builder(src, out)
            .segments(
                ids.iter()
                    .map(|&i| Segment::Track(TrackSegment::new(i, TrackType::Audio, "A_AAC"))),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_ready_jobs_are_ignored() {
        let queue = JobQueue::new(engine(std::path::Path::new("mkvextract")));
        assert!(queue.enqueue(params("/a.mkv".as_ref(), "/out".as_ref(), &[0, 1])).is_some());
        assert!(queue.enqueue(params("/A.MKV".as_ref(), "/out".as_ref(), &[1, 0])).is_none());
        assert!(queue.enqueue(params("/a.mkv".as_ref(), "/out".as_ref(), &[1])).is_some());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn finished_job_does_not_block_requeue() {
        let queue = JobQueue::new(engine(std::path::Path::new("mkvextract")));
        let id = queue
            .enqueue(params("/a.mkv".as_ref(), "/out".as_ref(), &[0]))
            .unwrap();
        queue.finish(id, JobState::Done);
        assert!(queue.enqueue(params("/a.mkv".as_ref(), "/out".as_ref(), &[0])).is_some());
    }

    #[test]
    fn reset_and_remove_refuse_running_jobs() {
        let queue = JobQueue::new(engine(std::path::Path::new("mkvextract")));
        let id = queue
            .enqueue(params("/a.mkv".as_ref(), "/out".as_ref(), &[0]))
            .unwrap();

        // Ready jobs reset to themselves
        queue.reset(id).unwrap();

        queue.start_next();
        assert!(matches!(queue.reset(id), Err(QueueError::JobRunning { .. })));
        assert!(matches!(queue.remove(id), Err(QueueError::JobRunning { .. })));
        assert!(matches!(queue.clear(), Err(QueueError::JobRunning { .. })));

        queue.set_progress(id, 40);
        queue.finish(id, JobState::Error("boom".into()));
        queue.reset(id).unwrap();
        let job = queue.get(id).unwrap();
        assert_eq!(job.state, JobState::Ready);
        assert_eq!(job.progress, 0);

        queue.remove(id).unwrap();
        assert!(queue.is_empty());
        assert!(matches!(queue.remove(id), Err(QueueError::NotFound { .. })));
    }

    #[test]
    fn only_one_run_at_a_time() {
        let queue = JobQueue::new(engine(std::path::Path::new("mkvextract")));
        let run = queue.run().unwrap();
        assert!(matches!(queue.run(), Err(QueueError::AlreadyRunning)));
        drop(run);
        assert!(queue.run().is_ok());
    }

    #[test]
    fn missing_output_directory_fails_only_that_job() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.mkv");
        fs::write(&src, b"").unwrap();

        let queue = JobQueue::new(engine(&dir.path().join("mkvextract")));
        let bad = queue
            .enqueue(params(&src, &dir.path().join("gone"), &[0]))
            .unwrap();
        let missing_tool = queue.enqueue(params(&src, dir.path(), &[0])).unwrap();

        let outcomes: Vec<JobOutcome> = queue.run().unwrap().collect();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(queue.get(bad).unwrap().state, JobState::Error(_)));
        assert!(matches!(
            queue.get(missing_tool).unwrap().state,
            JobState::Error(_)
        ));
    }

    #[test]
    fn unavailable_tool_stops_the_queue() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.mkv");
        fs::write(&src, b"").unwrap();

        let queue = JobQueue::new(engine(&dir.path().join("mkvextract")));
        let first = queue.enqueue(params(&src, dir.path(), &[0])).unwrap();
        let second = queue.enqueue(params(&src, dir.path(), &[1])).unwrap();

        let summary = queue.run_to_end().unwrap();
        assert!(matches!(queue.get(first).unwrap().state, JobState::Error(_)));
        assert_eq!(queue.get(second).unwrap().state, JobState::Ready);
        assert_eq!(summary.error, 1);
        assert_eq!(summary.ready, 1);
    }

    #[test]
    fn abort_all_before_run_is_cleared() {
        let queue = JobQueue::new(engine(std::path::Path::new("mkvextract")));
        queue.abort_all();
        let run = queue.run().unwrap();
        assert!(!queue.abort_controller().is_all_raised());
        drop(run);
    }
}
