//! Types for extraction operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::chapters::ChapterError;
use crate::config::{Settings, ToolPaths};
use crate::models::ExtractionMode;

/// Errors that end one extraction request.
///
/// A user abort is not an error, see [`ExtractionOutcome::Aborted`].
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Output already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    #[error("Output directory does not exist: {}", path.display())]
    OutputDirectoryMissing { path: PathBuf },

    #[error("Invalid output name '{name}'")]
    InvalidOutputName { name: String },

    #[error("Two outputs resolve to the same file: {}", path.display())]
    DuplicateOutput { path: PathBuf },

    #[error("Nothing to extract in {mode} mode")]
    NothingToExtract { mode: ExtractionMode },

    #[error("Source file not found: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("{tool} cannot be started: {reason}")]
    EngineUnavailable { tool: String, reason: String },

    #[error("mkvextract failed with exit code {exit_code}")]
    ExternalToolFailed { exit_code: i32, last_lines: Vec<String> },

    #[error("Chapter conversion failed: {0}")]
    ChapterConversion(#[from] ChapterError),

    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractionError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        ExtractionError::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether no later job can succeed either.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractionError::EngineUnavailable { .. })
    }

    /// Short status text for job listings.
    ///
    /// Tool failures include the last line the tool printed.
    pub fn status_message(&self) -> String {
        match self {
            ExtractionError::ExternalToolFailed { exit_code, last_lines } => {
                match last_lines.iter().rev().find(|l| !l.trim().is_empty()) {
                    Some(line) => format!("mkvextract exit code {}: {}", exit_code, line.trim()),
                    None => format!("mkvextract exit code {}", exit_code),
                }
            }
            other => other.to_string(),
        }
    }
}

/// Result type for extraction operations.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// How a request that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Every unit ran.
    Completed { outputs: Vec<PathBuf> },
    /// Stopped by an abort signal. Outputs of finished units are kept.
    Aborted {
        completed: Vec<PathBuf>,
        skipped_units: usize,
    },
}

impl ExtractionOutcome {
    /// Files written by finished units.
    pub fn outputs(&self) -> &[PathBuf] {
        match self {
            ExtractionOutcome::Completed { outputs } => outputs,
            ExtractionOutcome::Aborted { completed, .. } => completed,
        }
    }
}

/// Events emitted while a request runs, in tool output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionEvent {
    /// Overall request progress, non-decreasing within one request.
    Progress(u8),
    /// A segment started extracting.
    TrackStarted(String),
}

/// Engine configuration, built once from settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub tools: ToolPaths,
    /// Passed as `--ui-language` so output stays parseable.
    pub ui_language: String,
    /// How long abort-all waits for the tool before killing it.
    pub abort_grace: Duration,
    /// Tool output lines kept for failure reports.
    pub tail_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            ui_language: "en".to_string(),
            abort_grace: Duration::from_millis(3000),
            tail_lines: 20,
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            tools: ToolPaths::from_settings(&settings.tool),
            ui_language: settings.tool.ui_language.clone(),
            abort_grace: Duration::from_millis(settings.tool.abort_grace_ms),
            tail_lines: (settings.logging.error_tail as usize).max(1),
        }
    }

    /// Use a specific mkvextract executable.
    pub fn with_mkvextract(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools.mkvextract = path.into();
        self
    }

    pub fn with_abort_grace(mut self, grace: Duration) -> Self {
        self.abort_grace = grace;
        self
    }
}
