//! Append-only diagnostic line sink.
//!
//! The log is shared by the engine and the queue. Each line:
//! - is mirrored to `tracing` at its level
//! - is appended to an optional log file
//! - is sent to an optional subscriber callback
//! - is kept in a bounded tail buffer for error reports

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

struct Inner {
    config: LogConfig,
    log_path: Option<PathBuf>,
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Option<LogCallback>,
    tail_buffer: Mutex<VecDeque<String>>,
    /// Last progress value logged (for compact mode filtering).
    last_progress: Mutex<u32>,
}

/// Thread-safe diagnostic log. Clones write to the same sink.
#[derive(Clone)]
pub struct DiagnosticLog {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("config", &self.inner.config)
            .field("log_path", &self.inner.log_path)
            .finish()
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::in_memory(LogConfig::default())
    }
}

impl DiagnosticLog {
    /// Create a log that only keeps its tail buffer (and mirrors to tracing).
    pub fn in_memory(config: LogConfig) -> Self {
        Self::from_parts(config, None, None, None)
    }

    /// Create a log writing to `<log_dir>/<name>.log`.
    ///
    /// The directory is created if needed; an existing file is appended to.
    pub fn create_in(
        log_dir: impl AsRef<Path>,
        name: &str,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(name)));
        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

        Ok(Self::from_parts(config, Some(log_path), Some(BufWriter::new(file)), callback))
    }

    fn from_parts(
        config: LogConfig,
        log_path: Option<PathBuf>,
        writer: Option<BufWriter<File>>,
        callback: Option<LogCallback>,
    ) -> Self {
        let capacity = config.error_tail.max(1);
        Self {
            inner: Arc::new(Inner {
                config,
                log_path,
                file_writer: Mutex::new(writer),
                callback,
                tail_buffer: Mutex::new(VecDeque::with_capacity(capacity)),
                last_progress: Mutex::new(0),
            }),
        }
    }

    /// Get the log file path, if writing to a file.
    pub fn log_path(&self) -> Option<&Path> {
        self.inner.log_path.as_deref()
    }

    pub fn config(&self) -> &LogConfig {
        &self.inner.config
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        mirror_to_tracing(level, message);
        if level < self.inner.config.level {
            return;
        }
        self.remember(message);
        self.output(&self.format_message(message));
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    /// Log a section marker.
    pub fn section(&self, section_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(section_name));
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log progress update (filtered in compact mode).
    ///
    /// Returns true if the progress was logged, false if filtered.
    pub fn progress(&self, percent: u32) -> bool {
        if self.inner.config.compact {
            let mut last = self.inner.last_progress.lock();
            let step = self.inner.config.progress_step.max(1);

            // Only log at step intervals (e.g., 0%, 20%, 40%, ...)
            let current_step = (percent / step) * step;
            let last_step = (*last / step) * step;

            if current_step <= last_step && percent < 100 {
                return false;
            }
            *last = percent;
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Restart compact progress filtering (new job).
    pub fn reset_progress(&self) {
        *self.inner.last_progress.lock() = 0;
    }

    /// Log a line of external tool output.
    ///
    /// In compact mode, these are only added to the tail buffer.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        let prefix = if is_stderr { "[stderr] " } else { "" };
        let msg = format!("{}{}", prefix, line);
        tracing::trace!(target: "mkx_core::tool", "{}", msg);

        self.remember(&msg);
        if self.inner.config.compact {
            return;
        }
        self.output(&self.format_message(&msg));
    }

    /// Write the tail buffer below a header (typically after an error).
    pub fn show_tail(&self, header: &str) {
        let lines = self.tail();
        if lines.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in &lines {
            self.output(&self.format_message(line));
        }
    }

    /// Up to `n` most recent lines, most recent last.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let buffer = self.inner.tail_buffer.lock();
        let skip = buffer.len().saturating_sub(n);
        buffer.iter().skip(skip).cloned().collect()
    }

    /// The whole tail buffer, most recent last.
    pub fn tail(&self) -> Vec<String> {
        self.inner.tail_buffer.lock().iter().cloned().collect()
    }

    /// Clear the tail buffer.
    pub fn clear_tail(&self) {
        self.inner.tail_buffer.lock().clear();
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.inner.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    fn remember(&self, line: &str) {
        let capacity = self.inner.config.error_tail.max(1);
        let mut buffer = self.inner.tail_buffer.lock();
        while buffer.len() >= capacity {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    /// Format a message with timestamp (if enabled).
    fn format_message(&self, message: &str) -> String {
        if self.inner.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    /// Output a formatted message to file and callback.
    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.inner.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = self.inner.callback {
            callback(formatted);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }
}

fn mirror_to_tracing(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => tracing::trace!("{}", message),
        LogLevel::Debug => tracing::debug!("{}", message),
        LogLevel::Info => tracing::info!("{}", message),
        LogLevel::Warn => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
