//! Selection types.

use std::path::{Path, PathBuf};

use crate::models::{Segment, TrackType};

/// Aggregate check state of a group of segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    All,
    None,
    Mixed,
}

impl CheckState {
    /// Fold checked flags into a state. An empty group is `None`.
    pub fn fold(flags: impl IntoIterator<Item = bool>) -> Self {
        let mut any_checked = false;
        let mut any_unchecked = false;
        for checked in flags {
            if checked {
                any_checked = true;
            } else {
                any_unchecked = true;
            }
            if any_checked && any_unchecked {
                return CheckState::Mixed;
            }
        }
        if any_checked {
            CheckState::All
        } else {
            CheckState::None
        }
    }
}

/// Segment category used for bulk selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Video,
    Audio,
    Subtitle,
    Chapter,
    Attachment,
    Unknown,
}

impl SegmentKind {
    /// Kind of an extractable segment. `None` for the info record.
    pub fn of(segment: &Segment) -> Option<Self> {
        match segment {
            Segment::Info(_) => None,
            Segment::Track(t) => Some(match t.track_type {
                TrackType::Video => SegmentKind::Video,
                TrackType::Audio => SegmentKind::Audio,
                TrackType::Subtitles => SegmentKind::Subtitle,
                TrackType::Unknown => SegmentKind::Unknown,
            }),
            Segment::Attachment(_) => Some(SegmentKind::Attachment),
            Segment::Chapter(_) => Some(SegmentKind::Chapter),
        }
    }
}

/// Where outputs of a selection go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    Directory(PathBuf),
    /// Next to each source file.
    SourceDirectory,
}

impl OutputLocation {
    /// Output directory for one source file.
    pub fn resolve(&self, source_file: &Path) -> PathBuf {
        match self {
            OutputLocation::Directory(dir) => dir.clone(),
            OutputLocation::SourceDirectory => match source_file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                // A bare file name lives in the working directory
                _ => PathBuf::from("."),
            },
        }
    }
}
