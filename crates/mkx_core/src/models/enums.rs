//! Core enums used throughout the application.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Type of media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Video,
    Audio,
    Subtitles,
    Unknown,
}

impl TrackType {
    /// Map the `type` string reported by `mkvmerge -J`.
    pub fn from_mkvmerge(value: &str) -> Self {
        match value {
            "video" => TrackType::Video,
            "audio" => TrackType::Audio,
            "subtitles" => TrackType::Subtitles,
            _ => TrackType::Unknown,
        }
    }
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Video => write!(f, "video"),
            TrackType::Audio => write!(f, "audio"),
            TrackType::Subtitles => write!(f, "subtitles"),
            TrackType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Primary extraction mode of a request.
///
/// Modes are mutually exclusive per request. The mode decides which
/// segment variants are meaningful and which mkvextract modes get invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    #[default]
    Tracks,
    Tags,
    Attachments,
    Chapters,
    CueSheet,
    TimecodesV2,
    TimestampsV2,
    Cues,
}

impl ExtractionMode {
    /// Get the display name for this mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tracks => "Tracks",
            Self::Tags => "Tags",
            Self::Attachments => "Attachments",
            Self::Chapters => "Chapters",
            Self::CueSheet => "Cue_Sheet",
            Self::TimecodesV2 => "Timecodes_v2",
            Self::TimestampsV2 => "Timestamps_v2",
            Self::Cues => "Cues",
        }
    }

    /// Get all available modes.
    pub fn all() -> &'static [ExtractionMode] {
        &[
            Self::Tracks,
            Self::Tags,
            Self::Attachments,
            Self::Chapters,
            Self::CueSheet,
            Self::TimecodesV2,
            Self::TimestampsV2,
            Self::Cues,
        ]
    }

    /// Timecodes toggle implied by this mode.
    pub fn timecodes_mode(&self) -> TimecodesExtractionMode {
        match self {
            Self::TimecodesV2 | Self::TimestampsV2 => TimecodesExtractionMode::OnlyTimecodes,
            _ => TimecodesExtractionMode::NoTimecodes,
        }
    }

    /// Cues toggle implied by this mode.
    pub fn cues_mode(&self) -> CuesExtractionMode {
        match self {
            Self::Cues => CuesExtractionMode::OnlyCues,
            _ => CuesExtractionMode::NoCues,
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ExtractionMode {
    type Err = String;

    /// Accepts the display names as well as the snake_case config names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::all()
            .iter()
            .copied()
            .find(|m| m.name().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("unknown extraction mode '{}'", s))
    }
}

/// Output encoding for chapter extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChapterFormat {
    #[default]
    Xml,
    Ogm,
    Cue,
    Pbf,
}

impl ChapterFormat {
    /// Get the display name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Xml => "XML",
            Self::Ogm => "OGM",
            Self::Cue => "CUE",
            Self::Pbf => "PBF",
        }
    }

    /// File extension of the written chapter file.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Ogm => "ogm.txt",
            Self::Cue => "cue",
            Self::Pbf => "pbf",
        }
    }

    /// Get all available formats.
    pub fn all() -> &'static [ChapterFormat] {
        &[Self::Xml, Self::Ogm, Self::Cue, Self::Pbf]
    }
}

impl std::fmt::Display for ChapterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ChapterFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown chapter format '{}'", s))
    }
}

/// Whether track extraction produces timestamp files instead of payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimecodesExtractionMode {
    #[default]
    NoTimecodes,
    OnlyTimecodes,
}

/// Whether track extraction produces cue files instead of payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CuesExtractionMode {
    #[default]
    NoCues,
    OnlyCues,
}
