//! Saving and restoring the job list.
//!
//! Segment identities are not guaranteed to survive between sessions, so a
//! restore re-discovers every file through a [`Catalog`] and rebuilds the
//! parameters from what is found. Restoring is best effort.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::models::{
    ChapterFormat, CuesExtractionMode, ExtractionMode, Segment, SegmentId, TimecodesExtractionMode,
};
use crate::params::ExtractionParameters;
use crate::patterns::FilenamePatterns;

use super::queue::JobQueue;
use super::types::{Job, JobState, QueueError, QueueEvent, QueueResult};

/// Everything needed to rebuild a job's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedParameters {
    pub segments: Vec<SegmentId>,
    pub mode: ExtractionMode,
    pub chapter_format: ChapterFormat,
    pub timecodes_mode: TimecodesExtractionMode,
    pub cues_mode: CuesExtractionMode,
    pub filename_patterns: FilenamePatterns,
    pub disable_bom_for_text: bool,
    pub use_raw: bool,
    pub use_full_raw: bool,
    pub overwrite_existing: bool,
}

impl PersistedParameters {
    fn from_parameters(params: &ExtractionParameters) -> Self {
        Self {
            segments: params.segment_ids(),
            mode: params.mode,
            chapter_format: params.chapter_format,
            timecodes_mode: params.timecodes_mode,
            cues_mode: params.cues_mode,
            filename_patterns: params.filename_patterns.clone(),
            disable_bom_for_text: params.disable_bom_for_text,
            use_raw: params.use_raw,
            use_full_raw: params.use_full_raw,
            overwrite_existing: params.overwrite_existing,
        }
    }
}

/// One saved job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub source_file: PathBuf,
    pub output_directory: PathBuf,
    pub track_summary: String,
    pub status: JobState,
    /// Missing in lists written by older front ends; such records cannot
    /// be restored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<PersistedParameters>,
}

impl JobRecord {
    pub fn from_job(job: &Job) -> Self {
        Self {
            source_file: job.parameters.source_file().to_path_buf(),
            output_directory: job.parameters.output_directory.clone(),
            track_summary: job.track_summary(),
            status: job.state.clone(),
            parameters: Some(PersistedParameters::from_parameters(&job.parameters)),
        }
    }

    /// Rebuild the parameters against a fresh catalog listing.
    fn restore(&self, catalog: &dyn Catalog) -> Result<ExtractionParameters, String> {
        let saved = self
            .parameters
            .as_ref()
            .ok_or_else(|| "no saved parameters".to_string())?;

        let listing = catalog
            .discover(&self.source_file)
            .map_err(|e| e.to_string())?;

        let mut segments: Vec<Segment> = Vec::with_capacity(saved.segments.len());
        for id in &saved.segments {
            match listing.iter().find(|s| s.id() == *id) {
                Some(segment) => segments.push(segment.clone()),
                None => return Err(format!("segment {} no longer exists", id)),
            }
        }

        ExtractionParameters::builder(&self.source_file, &self.output_directory)
            .segments(segments)
            .mode(saved.mode)
            .chapter_format(saved.chapter_format)
            .timecodes(saved.timecodes_mode)
            .cues(saved.cues_mode)
            .patterns(saved.filename_patterns.clone())
            .disable_bom_for_text(saved.disable_bom_for_text)
            .raw(saved.use_raw, saved.use_full_raw)
            .overwrite_existing(saved.overwrite_existing)
            .build()
            .map_err(|e| e.to_string())
    }
}

/// Result of [`JobQueue::load_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Records that could not be restored, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

impl JobQueue {
    /// Write the job list as JSON, replacing `path` atomically.
    pub fn save_to(&self, path: &Path) -> QueueResult<()> {
        let records: Vec<JobRecord> = self.jobs.lock().iter().map(JobRecord::from_job).collect();
        let json = serde_json::to_string_pretty(&records)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| QueueError::io(format!("creating {}", parent.display()), e))?;
            }
        }

        // Write atomically via temp file
        let temp_file = path.with_extension("json.tmp");
        fs::write(&temp_file, &json)
            .map_err(|e| QueueError::io(format!("writing {}", temp_file.display()), e))?;
        fs::rename(&temp_file, path)
            .map_err(|e| QueueError::io(format!("replacing {}", path.display()), e))?;

        tracing::debug!("Saved {} jobs to {}", records.len(), path.display());
        Ok(())
    }

    /// Append the jobs saved in `path`.
    ///
    /// Each record is re-discovered through `catalog`. Records whose file
    /// or segments cannot be found are skipped, as are `Ready` jobs equal to
    /// one already waiting in the queue. Jobs saved while running come back
    /// `Ready`.
    pub fn load_from(&self, path: &Path, catalog: &dyn Catalog) -> QueueResult<RestoreReport> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueueError::io(format!("reading {}", path.display()), e))?;
        let records: Vec<JobRecord> = serde_json::from_str(&content)?;

        let mut report = RestoreReport::default();
        let mut restored: Vec<Job> = Vec::new();

        for record in records {
            match record.restore(catalog) {
                Ok(parameters) => {
                    let mut job = Job::new(parameters);
                    job.state = match record.status {
                        JobState::Running => JobState::Ready,
                        other => other,
                    };
                    if job.state == JobState::Done {
                        job.progress = 100;
                    }
                    restored.push(job);
                }
                Err(reason) => {
                    tracing::warn!(
                        "Skipping saved job for {}: {}",
                        record.source_file.display(),
                        reason
                    );
                    report.skipped.push((record.source_file, reason));
                }
            }
        }

        let mut events: Vec<QueueEvent> = Vec::with_capacity(restored.len());
        {
            let mut jobs = self.jobs.lock();
            for job in restored {
                let duplicate = job.state == JobState::Ready
                    && jobs
                        .iter()
                        .any(|j| j.state == JobState::Ready && j.parameters == job.parameters);
                if duplicate {
                    tracing::debug!(
                        "Skipping saved job for {}: already queued",
                        job.source_file().display()
                    );
                    report.skipped.push((
                        job.source_file().to_path_buf(),
                        "duplicate of a queued job".to_string(),
                    ));
                    continue;
                }
                events.push(QueueEvent::JobStateChanged {
                    job_id: job.id,
                    state: job.state.clone(),
                });
                jobs.push(job);
            }
        }
        report.restored = events.len();

        for event in events {
            self.emit(event);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortController;
    use crate::catalog::StaticCatalog;
    use crate::extraction::{EngineConfig, ExtractionEngine};
    use crate::logging::DiagnosticLog;
    use crate::models::{ChapterSegment, SegmentInfo, TrackSegment, TrackType};
    use tempfile::tempdir;

    fn queue() -> JobQueue {
        JobQueue::new(ExtractionEngine::new(
            EngineConfig::default(),
            DiagnosticLog::default(),
            AbortController::new(),
        ))
    }

    fn listing() -> Vec<Segment> {
        vec![
            Segment::Info(SegmentInfo::default()),
            Segment::Track(TrackSegment::new(0, TrackType::Video, "V_MPEG4/ISO/AVC")),
            Segment::Track(TrackSegment::new(1, TrackType::Audio, "A_FLAC").with_language("ger")),
            Segment::Chapter(ChapterSegment { entry_count: 3 }),
        ]
    }

    #[test]
    fn save_and_restore_through_catalog() {
        let dir = tempdir().unwrap();
        let jobs_file = dir.path().join("cfg").join("jobs.json");

        let source = queue();
        let params = ExtractionParameters::builder("/media/a.mkv", "/out")
            .segments(listing())
            .mode(ExtractionMode::Tracks)
            .overwrite_existing(true)
            .build()
            .unwrap();
        let done = source.enqueue(params.clone()).unwrap();
        source.finish(done, JobState::Done);
        source.save_to(&jobs_file).unwrap();
        assert!(!jobs_file.with_extension("json.tmp").exists());

        let catalog = StaticCatalog::new().with_file("/media/a.mkv", listing());
        let restored = queue();
        let report = restored.load_from(&jobs_file, &catalog).unwrap();
        assert_eq!(report.restored, 1);
        assert!(report.skipped.is_empty());

        let jobs = restored.jobs();
        assert_eq!(jobs[0].parameters, params);
        assert_eq!(jobs[0].state, JobState::Done);
        assert_eq!(jobs[0].progress, 100);
    }

    #[test]
    fn vanished_segments_are_skipped() {
        let dir = tempdir().unwrap();
        let jobs_file = dir.path().join("jobs.json");

        let source = queue();
        source.enqueue(
            ExtractionParameters::builder("/media/a.mkv", "/out")
                .segments(listing())
                .build()
                .unwrap(),
        );
        source.enqueue(
            ExtractionParameters::builder("/media/b.mkv", "/out")
                .segments(listing())
                .build()
                .unwrap(),
        );
        source.save_to(&jobs_file).unwrap();

        // a.mkv lost its audio track, b.mkv is gone entirely
        let catalog = StaticCatalog::new().with_file("/media/a.mkv", listing()[..2].to_vec());
        let restored = queue();
        let report = restored.load_from(&jobs_file, &catalog).unwrap();
        assert_eq!(report.restored, 0);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped[0].1.contains("track:1"));
        assert!(restored.is_empty());
    }

    #[test]
    fn loading_twice_does_not_duplicate_ready_jobs() {
        let dir = tempdir().unwrap();
        let jobs_file = dir.path().join("jobs.json");
        let catalog = StaticCatalog::new().with_file("/media/a.mkv", listing());

        let q = queue();
        let params = ExtractionParameters::builder("/media/a.mkv", "/out")
            .segments(listing())
            .build()
            .unwrap();
        q.enqueue(params.clone()).unwrap();
        q.save_to(&jobs_file).unwrap();

        let report = q.load_from(&jobs_file, &catalog).unwrap();
        assert_eq!(report.restored, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].1, "duplicate of a queued job");
        assert_eq!(q.len(), 1);

        let fresh = queue();
        assert_eq!(fresh.load_from(&jobs_file, &catalog).unwrap().restored, 1);
        assert_eq!(fresh.load_from(&jobs_file, &catalog).unwrap().restored, 0);
        assert_eq!(fresh.len(), 1);
        assert!(fresh.enqueue(params).is_none());
    }

    #[test]
    fn finished_jobs_do_not_block_a_restored_ready_job() {
        let dir = tempdir().unwrap();
        let jobs_file = dir.path().join("jobs.json");
        let catalog = StaticCatalog::new().with_file("/media/a.mkv", listing());
        let params = ExtractionParameters::builder("/media/a.mkv", "/out")
            .segments(listing())
            .build()
            .unwrap();

        let saved = queue();
        saved.enqueue(params.clone()).unwrap();
        saved.save_to(&jobs_file).unwrap();

        let q = queue();
        let done = q.enqueue(params).unwrap();
        q.finish(done, JobState::Done);
        assert_eq!(q.load_from(&jobs_file, &catalog).unwrap().restored, 1);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn running_records_come_back_ready() {
        let dir = tempdir().unwrap();
        let jobs_file = dir.path().join("jobs.json");

        let record = JobRecord {
            source_file: "/media/a.mkv".into(),
            output_directory: "/out".into(),
            track_summary: String::new(),
            status: JobState::Running,
            parameters: Some(PersistedParameters {
                segments: vec![SegmentId::Track(0)],
                mode: ExtractionMode::Tracks,
                chapter_format: ChapterFormat::Xml,
                timecodes_mode: TimecodesExtractionMode::NoTimecodes,
                cues_mode: CuesExtractionMode::NoCues,
                filename_patterns: FilenamePatterns::default(),
                disable_bom_for_text: false,
                use_raw: false,
                use_full_raw: false,
                overwrite_existing: false,
            }),
        };
        fs::write(&jobs_file, serde_json::to_string(&vec![record]).unwrap()).unwrap();

        let catalog = StaticCatalog::new().with_file("/media/a.mkv", listing());
        let restored = queue();
        restored.load_from(&jobs_file, &catalog).unwrap();
        assert_eq!(restored.jobs()[0].state, JobState::Ready);
    }

    #[test]
    fn records_without_parameters_are_reported() {
        let dir = tempdir().unwrap();
        let jobs_file = dir.path().join("jobs.json");
        fs::write(
            &jobs_file,
            r#"[{"source_file":"/x.mkv","output_directory":"/o","track_summary":"","status":"Ready"}]"#,
        )
        .unwrap();

        let report = queue()
            .load_from(&jobs_file, &StaticCatalog::new())
            .unwrap();
        assert_eq!(report.skipped, vec![(PathBuf::from("/x.mkv"), "no saved parameters".to_string())]);
    }

    #[test]
    fn malformed_list_is_an_error() {
        let dir = tempdir().unwrap();
        let jobs_file = dir.path().join("jobs.json");
        fs::write(&jobs_file, "not json").unwrap();
        assert!(matches!(
            queue().load_from(&jobs_file, &StaticCatalog::new()),
            Err(QueueError::Json(_))
        ));
    }
}
