//! Extraction engine: runs a plan against mkvextract.
//!
//! Units run one after another. The abort-current signal is checked
//! between units; a unit that already started is allowed to finish, and the
//! request still ends aborted if the signal came in meanwhile. When
//! abort-all is raised while a unit runs, the child process is killed
//! after the configured grace period.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::abort::AbortController;
use crate::chapters::convert_file;
use crate::logging::DiagnosticLog;
use crate::params::ExtractionParameters;

use super::mkvextract::{build_args, classify_line, display_command, ToolLine};
use super::plan::{plan, ExtractionPlan, PlannedUnit, PostStep};
use super::types::{
    EngineConfig, ExtractionError, ExtractionEvent, ExtractionOutcome, ExtractionResult,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How a single invocation ended.
enum UnitExit {
    Success,
    /// Killed after abort-all.
    Killed,
}

/// Unit-weighted, non-decreasing request progress.
struct ProgressTracker {
    units: usize,
    done: usize,
    last: u8,
}

impl ProgressTracker {
    fn new(units: usize) -> Self {
        Self {
            units: units.max(1),
            done: 0,
            last: 0,
        }
    }

    /// Record progress of the running unit. Returns the overall value if
    /// it increased.
    fn update(&mut self, unit_percent: u8) -> Option<u8> {
        let overall = (self.done * 100 + unit_percent.min(100) as usize) / self.units;
        self.advance(overall as u8)
    }

    fn finish_unit(&mut self) -> Option<u8> {
        self.done = (self.done + 1).min(self.units);
        self.advance((self.done * 100 / self.units) as u8)
    }

    fn advance(&mut self, overall: u8) -> Option<u8> {
        if overall > self.last {
            self.last = overall;
            Some(overall)
        } else {
            None
        }
    }
}

/// Drives mkvextract for extraction requests.
///
/// The engine holds no per-request state; one engine can serve every job
/// of a queue.
pub struct ExtractionEngine {
    config: EngineConfig,
    log: DiagnosticLog,
    abort: AbortController,
}

impl ExtractionEngine {
    pub fn new(config: EngineConfig, log: DiagnosticLog, abort: AbortController) -> Self {
        Self { config, log, abort }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn abort_controller(&self) -> &AbortController {
        &self.abort
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    /// Resolve outputs and run the pre-flight checks without extracting.
    pub fn plan(&self, params: &ExtractionParameters) -> ExtractionResult<ExtractionPlan> {
        plan(params)
    }

    /// Plan and execute a request.
    pub fn run(
        &self,
        params: &ExtractionParameters,
        on_event: &dyn Fn(ExtractionEvent),
    ) -> ExtractionResult<ExtractionOutcome> {
        let plan = self.plan(params)?;
        self.execute(&plan, on_event)
    }

    /// Execute a plan, one mkvextract invocation per unit.
    pub fn execute(
        &self,
        plan: &ExtractionPlan,
        on_event: &dyn Fn(ExtractionEvent),
    ) -> ExtractionResult<ExtractionOutcome> {
        let mut tracker = ProgressTracker::new(plan.units.len());
        let mut completed: Vec<PathBuf> = Vec::new();
        self.log.reset_progress();

        for (index, unit) in plan.units.iter().enumerate() {
            if self.abort.is_current_raised() {
                let skipped_units = plan.units.len() - index;
                self.log
                    .warn(&format!("Aborted, skipping {} remaining invocation(s)", skipped_units));
                return Ok(ExtractionOutcome::Aborted {
                    completed,
                    skipped_units,
                });
            }

            self.log.section(&format!(
                "{} ({}/{})",
                unit.mode,
                index + 1,
                plan.units.len()
            ));
            for name in &unit.announce {
                on_event(ExtractionEvent::TrackStarted(name.clone()));
            }
            prepare_directories(unit)?;

            match self.run_unit(plan, unit, &mut tracker, on_event)? {
                UnitExit::Success => {}
                UnitExit::Killed => {
                    return Ok(ExtractionOutcome::Aborted {
                        completed,
                        skipped_units: plan.units.len() - index,
                    });
                }
            }

            self.post_process(plan, unit)?;
            completed.extend(unit.targets.iter().map(|t| t.output.clone()));

            if let Some(p) = tracker.finish_unit() {
                self.emit_progress(p, on_event);
            }
        }

        // Raised while the last unit ran: its outputs stay, the job does not
        // count as done
        if self.abort.is_current_raised() {
            self.log.warn("Aborted after the last invocation finished");
            return Ok(ExtractionOutcome::Aborted {
                completed,
                skipped_units: 0,
            });
        }

        self.log.success(&format!(
            "Extracted {} file(s) from {}",
            completed.len(),
            plan.source_file.display()
        ));
        Ok(ExtractionOutcome::Completed { outputs: completed })
    }

    fn emit_progress(&self, percent: u8, on_event: &dyn Fn(ExtractionEvent)) {
        self.log.progress(percent as u32);
        on_event(ExtractionEvent::Progress(percent));
    }

    /// Run one mkvextract invocation to completion.
    fn run_unit(
        &self,
        plan: &ExtractionPlan,
        unit: &PlannedUnit,
        tracker: &mut ProgressTracker,
        on_event: &dyn Fn(ExtractionEvent),
    ) -> ExtractionResult<UnitExit> {
        let program = &self.config.tools.mkvextract;
        let args = build_args(&self.config.ui_language, &plan.source_file, unit);
        self.log.clear_tail();
        self.log.command(&display_command(program, &args));

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractionError::EngineUnavailable {
                tool: program.display().to_string(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let child = Mutex::new(child);
        let finished = AtomicBool::new(false);
        let killed = AtomicBool::new(false);
        let tail = Mutex::new(VecDeque::with_capacity(self.config.tail_lines));

        let status = thread::scope(|s| {
            s.spawn(|| self.watchdog(&child, &finished, &killed));

            if let Some(stderr) = stderr {
                s.spawn(|| {
                    for_each_line(stderr, |line| {
                        self.log.output_line(line, true);
                        push_tail(&tail, line, self.config.tail_lines);
                    })
                });
            }

            if let Some(stdout) = stdout {
                for_each_line(stdout, |line| {
                    push_tail(&tail, line, self.config.tail_lines);
                    match classify_line(line) {
                        ToolLine::Progress(p) => {
                            if let Some(overall) = tracker.update(p) {
                                self.emit_progress(overall, on_event);
                            }
                        }
                        ToolLine::TrackStarted(id) => match unit.label_for(id) {
                            Some(label) => {
                                self.log.info(&format!("Extracting {}", label));
                                on_event(ExtractionEvent::TrackStarted(label.to_string()));
                            }
                            None => self.log.output_line(line, false),
                        },
                        ToolLine::Other => self.log.output_line(line, false),
                    }
                });
            }

            let status = wait_for_exit(&child);
            finished.store(true, Ordering::SeqCst);
            self.abort.notify_waiters();
            status
        })
        .map_err(|e| ExtractionError::io("waiting for mkvextract", e))?;

        if killed.load(Ordering::SeqCst) {
            self.log.warn("mkvextract was stopped by abort-all");
            return Ok(UnitExit::Killed);
        }

        if status.success() {
            return Ok(UnitExit::Success);
        }

        let exit_code = status.code().unwrap_or(-1);
        let last_lines: Vec<String> = tail.into_inner().into_iter().collect();
        self.log
            .error(&format!("mkvextract exited with code {}", exit_code));
        self.log.show_tail("mkvextract");
        Err(ExtractionError::ExternalToolFailed {
            exit_code,
            last_lines,
        })
    }

    /// Kill the child once abort-all has been raised for longer than the
    /// grace period.
    fn watchdog(&self, child: &Mutex<Child>, finished: &AtomicBool, killed: &AtomicBool) {
        loop {
            if finished.load(Ordering::SeqCst) {
                return;
            }
            if self.abort.wait_for_abort_all(Duration::from_millis(100)) {
                break;
            }
        }

        let deadline = Instant::now() + self.config.abort_grace;
        while Instant::now() < deadline {
            if finished.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }

        let mut child = child.lock();
        if let Ok(None) = child.try_wait() {
            if child.kill().is_ok() {
                killed.store(true, Ordering::SeqCst);
                tracing::warn!("Killed mkvextract after abort-all grace period");
            }
        }
    }

    fn post_process(&self, plan: &ExtractionPlan, unit: &PlannedUnit) -> ExtractionResult<()> {
        if let Some(PostStep::ConvertChapters { target, media_file }) = &unit.post {
            for t in &unit.targets {
                let xml = t.tool_path();
                let result = convert_file(xml, &t.output, *target, media_file);
                if xml != t.output.as_path() {
                    let _ = fs::remove_file(xml);
                }
                let count = result?;
                self.log
                    .info(&format!("Converted {} chapter(s) to {}", count, t.output.display()));
            }
        }

        if plan.strip_bom {
            for t in unit.targets.iter().filter(|t| t.text) {
                if strip_utf8_bom(&t.output)? {
                    self.log.debug(&format!("Removed BOM from {}", t.output.display()));
                }
            }
        }
        Ok(())
    }
}

/// Create parent directories of outputs placed in sub-folders.
fn prepare_directories(unit: &PlannedUnit) -> ExtractionResult<()> {
    for target in &unit.targets {
        if let Some(parent) = target.output.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    ExtractionError::io(format!("creating {}", parent.display()), e)
                })?;
            }
        }
    }
    Ok(())
}

/// Reap the child. Called once its stdout is closed, so the watchdog no
/// longer needs the lock to kill it.
fn wait_for_exit(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    child.lock().wait()
}

fn push_tail(tail: &Mutex<VecDeque<String>>, line: &str, limit: usize) {
    let mut tail = tail.lock();
    while tail.len() >= limit.max(1) {
        tail.pop_front();
    }
    tail.push_back(line.to_string());
}

/// Split a byte stream on `\n` and `\r` (progress updates often use a bare
/// carriage return) and call `f` for every non-empty line.
fn for_each_line(mut reader: impl Read, mut f: impl FnMut(&str)) {
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    let mut flush = |pending: &mut Vec<u8>| {
        if !pending.is_empty() {
            let line = String::from_utf8_lossy(pending);
            let line = line.trim_end();
            if !line.is_empty() {
                f(line);
            }
            pending.clear();
        }
    };

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                flush(&mut pending);
            } else {
                pending.push(byte);
            }
        }
    }
    flush(&mut pending);
}

/// Remove a leading UTF-8 BOM. Returns whether the file changed.
pub fn strip_utf8_bom(path: &Path) -> ExtractionResult<bool> {
    let data = match fs::read(path) {
        Ok(data) => data,
        // Tools skip empty outputs; nothing to strip
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ExtractionError::io(format!("reading {}", path.display()), e)),
    };

    match data.strip_prefix(UTF8_BOM) {
        Some(rest) => {
            fs::write(path, rest)
                .map_err(|e| ExtractionError::io(format!("writing {}", path.display()), e))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn progress_is_unit_weighted_and_monotone() {
        let mut tracker = ProgressTracker::new(2);
        assert_eq!(tracker.update(50), Some(25));
        assert_eq!(tracker.update(40), None);
        assert_eq!(tracker.update(100), Some(50));
        assert_eq!(tracker.finish_unit(), None);
        assert_eq!(tracker.update(10), Some(55));
        assert_eq!(tracker.finish_unit(), Some(100));
        assert_eq!(tracker.finish_unit(), None);
    }

    #[test]
    fn splits_lines_on_cr_and_lf() {
        let input: &[u8] = b"Progress: 1%\rProgress: 2%\r\nExtracting track 0\n\nlast";
        let mut lines = Vec::new();
        for_each_line(input, |l| lines.push(l.to_string()));
        assert_eq!(lines, vec!["Progress: 1%", "Progress: 2%", "Extracting track 0", "last"]);
    }

    #[test]
    fn strips_bom_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.srt");
        fs::write(&path, b"\xEF\xBB\xBF1\n").unwrap();

        assert!(strip_utf8_bom(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"1\n");
        assert!(!strip_utf8_bom(&path).unwrap());
        assert!(!strip_utf8_bom(&dir.path().join("missing")).unwrap());
    }

    #[test]
    fn tail_is_bounded() {
        let tail = Mutex::new(VecDeque::new());
        for i in 0..5 {
            push_tail(&tail, &i.to_string(), 3);
        }
        let lines: Vec<String> = tail.into_inner().into_iter().collect();
        assert_eq!(lines, vec!["2", "3", "4"]);
    }

    #[test]
    fn missing_binary_is_engine_unavailable() {
        crate::logging::init_test_tracing();
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.mkv");
        fs::write(&source, b"").unwrap();

        let params = ExtractionParameters::builder(&source, dir.path())
            .segment(crate::models::Segment::Track(crate::models::TrackSegment::new(
                0,
                crate::models::TrackType::Video,
                "V_AV1",
            )))
            .build()
            .unwrap();

        let engine = ExtractionEngine::new(
            EngineConfig::default().with_mkvextract(dir.path().join("no-such-mkvextract")),
            DiagnosticLog::default(),
            AbortController::new(),
        );
        let err = engine.run(&params, &|_| {}).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn raised_abort_skips_every_unit() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.mkv");
        fs::write(&source, b"").unwrap();
        let params = ExtractionParameters::builder(&source, dir.path())
            .segment(crate::models::Segment::Chapter(Default::default()))
            .mode(crate::models::ExtractionMode::Chapters)
            .build()
            .unwrap();

        let abort = AbortController::new();
        abort.abort_current();
        let engine = ExtractionEngine::new(
            EngineConfig::default().with_mkvextract(dir.path().join("unused")),
            DiagnosticLog::default(),
            abort,
        );
        let outcome = engine.run(&params, &|_| {}).unwrap();
        assert_eq!(
            outcome,
            ExtractionOutcome::Aborted {
                completed: vec![],
                skipped_units: 1
            }
        );
    }
}
