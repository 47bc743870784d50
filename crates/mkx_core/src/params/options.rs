//! Per-request extraction options shared by every file of a selection.

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::models::{ChapterFormat, ExtractionMode};
use crate::patterns::FilenamePatterns;

/// Options that apply to every file queued from one selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    pub mode: ExtractionMode,
    pub chapter_format: ChapterFormat,
    pub filename_patterns: FilenamePatterns,
    pub disable_bom_for_text: bool,
    pub use_raw: bool,
    pub use_full_raw: bool,
    pub overwrite_existing: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Tracks,
            chapter_format: ChapterFormat::Xml,
            filename_patterns: FilenamePatterns::default(),
            disable_bom_for_text: false,
            use_raw: false,
            use_full_raw: false,
            overwrite_existing: false,
        }
    }
}

impl ExtractionOptions {
    /// Build options from the loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let ext = &settings.extraction;
        Self {
            mode: ext.mode,
            chapter_format: ext.chapter_format,
            filename_patterns: settings.patterns.clone(),
            disable_bom_for_text: ext.disable_bom_for_text,
            use_raw: ext.use_raw,
            use_full_raw: ext.use_full_raw,
            overwrite_existing: ext.overwrite_existing,
        }
    }

    /// Set the extraction mode.
    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the chapter output format.
    pub fn with_chapter_format(mut self, format: ChapterFormat) -> Self {
        self.chapter_format = format;
        self
    }

    /// Allow or forbid overwriting existing outputs.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }
}
