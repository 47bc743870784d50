//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};
use crate::models::{ChapterFormat, ExtractionMode};
use crate::patterns::FilenamePatterns;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// External tool settings.
    #[serde(default)]
    pub tool: ToolSettings,

    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Default extraction options.
    #[serde(default)]
    pub extraction: ExtractionSettings,

    /// Output filename templates.
    #[serde(default)]
    pub patterns: FilenamePatterns,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// MKVToolNix location and invocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Directory containing mkvextract/mkvmerge. Empty means PATH lookup.
    #[serde(default)]
    pub mkvtoolnix_path: String,

    /// Language for tool messages (`--ui-language`).
    #[serde(default = "default_ui_language")]
    pub ui_language: String,

    /// How long abort-all waits before killing the running tool.
    #[serde(default = "default_abort_grace_ms")]
    pub abort_grace_ms: u64,
}

fn default_ui_language() -> String {
    "en".to_string()
}

fn default_abort_grace_ms() -> u64 {
    3000
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            mkvtoolnix_path: String::new(),
            ui_language: default_ui_language(),
            abort_grace_ms: default_abort_grace_ms(),
        }
    }
}

/// Path configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Last output directory chosen by the user.
    #[serde(default)]
    pub last_output_directory: String,

    /// Write outputs next to each source file.
    #[serde(default = "default_true")]
    pub use_source_directory: bool,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Where the job list is saved.
    #[serde(default = "default_jobs_file")]
    pub jobs_file: String,
}

fn default_true() -> bool {
    true
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_jobs_file() -> String {
    ".config/jobs.json".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            last_output_directory: String::new(),
            use_source_directory: true,
            logs_folder: default_logs_folder(),
            jobs_file: default_jobs_file(),
        }
    }
}

/// Default extraction options applied to new selections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSettings {
    #[serde(default)]
    pub mode: ExtractionMode,

    #[serde(default)]
    pub chapter_format: ChapterFormat,

    #[serde(default)]
    pub overwrite_existing: bool,

    /// Strip the UTF-8 BOM from text outputs.
    #[serde(default)]
    pub disable_bom_for_text: bool,

    /// Pass `--raw` to mkvextract.
    #[serde(default)]
    pub use_raw: bool,

    /// Pass `--fullraw` to mkvextract.
    #[serde(default)]
    pub use_full_raw: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level for the diagnostic log and the tracing default.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of error lines to show in tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Prefix log lines with timestamps.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

impl LoggingSettings {
    /// Diagnostic log configuration for these settings.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail as usize,
            show_timestamps: self.show_timestamps,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Tool,
    Paths,
    Extraction,
    Patterns,
    Logging,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Tool => "tool",
            ConfigSection::Paths => "paths",
            ConfigSection::Extraction => "extraction",
            ConfigSection::Patterns => "patterns",
            ConfigSection::Logging => "logging",
        }
    }

    /// All sections in file order.
    pub fn all() -> &'static [ConfigSection] {
        &[
            ConfigSection::Tool,
            ConfigSection::Paths,
            ConfigSection::Extraction,
            ConfigSection::Patterns,
            ConfigSection::Logging,
        ]
    }
}
