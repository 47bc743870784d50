//! Filename template sets and file context.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::{Segment, TrackType};

/// One filename template per segment category.
///
/// Equality is plain field-by-field string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilenamePatterns {
    #[serde(default = "default_track_pattern")]
    pub video: String,
    #[serde(default = "default_track_pattern")]
    pub audio: String,
    #[serde(default = "default_track_pattern")]
    pub subtitle: String,
    #[serde(default = "default_chapter_pattern")]
    pub chapter: String,
    #[serde(default = "default_attachment_pattern")]
    pub attachment: String,
    #[serde(default = "default_tags_pattern")]
    pub tags: String,
}

fn default_track_pattern() -> String {
    "{FilenameNoExt}_track{TrackNumber:00}_{Language}".to_string()
}

fn default_chapter_pattern() -> String {
    "{FilenameNoExt}_chapters".to_string()
}

fn default_attachment_pattern() -> String {
    "{AttachmentFilename}".to_string()
}

fn default_tags_pattern() -> String {
    "{FilenameNoExt}_tags".to_string()
}

impl Default for FilenamePatterns {
    fn default() -> Self {
        Self {
            video: default_track_pattern(),
            audio: default_track_pattern(),
            subtitle: default_track_pattern(),
            chapter: default_chapter_pattern(),
            attachment: default_attachment_pattern(),
            tags: default_tags_pattern(),
        }
    }
}

impl FilenamePatterns {
    /// Template used to name the given segment.
    ///
    /// Tracks of unknown type use the video template. Info segments are
    /// never written, they fall back to the tags template.
    pub fn for_segment(&self, segment: &Segment) -> &str {
        match segment {
            Segment::Track(t) => match t.track_type {
                TrackType::Audio => &self.audio,
                TrackType::Subtitles => &self.subtitle,
                TrackType::Video | TrackType::Unknown => &self.video,
            },
            Segment::Attachment(_) => &self.attachment,
            Segment::Chapter(_) => &self.chapter,
            Segment::Info(_) => &self.tags,
        }
    }
}

/// File-level values available to every template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    source_file: PathBuf,
}

impl FileContext {
    pub fn new(source_file: impl Into<PathBuf>) -> Self {
        Self {
            source_file: source_file.into(),
        }
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// File name including extension (`movie.mkv`).
    pub fn file_name(&self) -> String {
        self.source_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name without its last extension (`movie`).
    pub fn file_stem(&self) -> String {
        self.source_file
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
