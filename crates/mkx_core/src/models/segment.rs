//! Segments of a Matroska container as reported by the catalog.
//!
//! A segment is either informational (`Info`) or extractable (tracks,
//! attachments, chapters). Every segment has a stable [`SegmentId`] used
//! for deduplication and order-independent set comparison.

use serde::{Deserialize, Serialize};

use super::enums::TrackType;

/// Stable identity of a segment within one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SegmentId {
    Info,
    Track(u64),
    Attachment(u64),
    Chapters,
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentId::Info => write!(f, "info"),
            SegmentId::Track(id) => write!(f, "track:{}", id),
            SegmentId::Attachment(id) => write!(f, "attachment:{}", id),
            SegmentId::Chapters => write!(f, "chapters"),
        }
    }
}

/// Container-level metadata. Exactly one per file, never extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Duration in nanoseconds.
    pub duration_ns: Option<u64>,
    #[serde(default)]
    pub muxing_application: String,
    #[serde(default)]
    pub writing_application: String,
    /// Creation date as reported by the container (UTC, RFC 3339).
    pub date: Option<String>,
}

/// A media track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    /// Track ID (mkvmerge/mkvextract numbering, 0-based).
    pub id: u64,
    /// Track number as stored in the container (1-based).
    pub number: u64,
    pub track_type: TrackType,
    /// Codec identifier (e.g., "A_AAC", "V_MPEG4/ISO/AVC").
    pub codec_id: String,
    /// Human readable codec name.
    #[serde(default)]
    pub codec: String,
    /// Language code (ISO 639-2, e.g., "eng", "jpn", "und").
    #[serde(default = "default_lang")]
    pub language: String,
    /// IETF BCP 47 language tag.
    #[serde(default)]
    pub language_ietf: Option<String>,
    /// Track name/title.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub forced: bool,
    /// Container delay in milliseconds.
    #[serde(default)]
    pub delay_ms: i64,
    /// Delay including codec/stream delay in milliseconds.
    #[serde(default)]
    pub effective_delay_ms: i64,
    #[serde(default)]
    pub pixel_width: Option<u32>,
    #[serde(default)]
    pub pixel_height: Option<u32>,
    #[serde(default)]
    pub sampling_frequency: Option<f64>,
    #[serde(default)]
    pub channels: Option<u32>,
}

fn default_lang() -> String {
    "und".to_string()
}

impl TrackSegment {
    /// Create a new track with required fields. The track number defaults
    /// to `id + 1`.
    pub fn new(id: u64, track_type: TrackType, codec_id: impl Into<String>) -> Self {
        Self {
            id,
            number: id + 1,
            track_type,
            codec_id: codec_id.into(),
            codec: String::new(),
            language: default_lang(),
            language_ietf: None,
            name: String::new(),
            forced: false,
            delay_ms: 0,
            effective_delay_ms: 0,
            pixel_width: None,
            pixel_height: None,
            sampling_frequency: None,
            channels: None,
        }
    }

    /// Set the container track number.
    pub fn with_number(mut self, number: u64) -> Self {
        self.number = number;
        self
    }

    /// Set the language code.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the track name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the delay (container and effective).
    pub fn with_delay(mut self, delay_ms: i64) -> Self {
        self.delay_ms = delay_ms;
        self.effective_delay_ms = delay_ms;
        self
    }

    /// Set video dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.pixel_width = Some(width);
        self.pixel_height = Some(height);
        self
    }

    /// Set audio properties.
    pub fn with_audio(mut self, sampling_frequency: f64, channels: u32) -> Self {
        self.sampling_frequency = Some(sampling_frequency);
        self.channels = Some(channels);
        self
    }

    /// Whether mkvextract writes this track as a text file.
    pub fn is_text(&self) -> bool {
        self.codec_id.starts_with("S_TEXT/")
    }
}

/// An attachment (fonts, cover images, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSegment {
    /// Attachment ID (1-based, mkvextract numbering).
    pub id: u64,
    /// Original filename.
    pub file_name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl AttachmentSegment {
    /// Create a new attachment.
    pub fn new(id: u64, file_name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}

/// The chapters of a container, extracted as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSegment {
    /// Number of chapter entries across all editions.
    pub entry_count: usize,
}

/// A segment of a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "segment", rename_all = "lowercase")]
pub enum Segment {
    Info(SegmentInfo),
    Track(TrackSegment),
    Attachment(AttachmentSegment),
    Chapter(ChapterSegment),
}

impl Segment {
    /// Stable identity of this segment.
    pub fn id(&self) -> SegmentId {
        match self {
            Segment::Info(_) => SegmentId::Info,
            Segment::Track(t) => SegmentId::Track(t.id),
            Segment::Attachment(a) => SegmentId::Attachment(a.id),
            Segment::Chapter(_) => SegmentId::Chapters,
        }
    }

    /// Whether this segment can be extracted at all.
    pub fn is_extractable(&self) -> bool {
        !matches!(self, Segment::Info(_))
    }

    /// Get the track, if this is a track segment.
    pub fn as_track(&self) -> Option<&TrackSegment> {
        match self {
            Segment::Track(t) => Some(t),
            _ => None,
        }
    }

    /// Get the attachment, if this is an attachment segment.
    pub fn as_attachment(&self) -> Option<&AttachmentSegment> {
        match self {
            Segment::Attachment(a) => Some(a),
            _ => None,
        }
    }

    /// Get a display string for this segment.
    pub fn display_name(&self) -> String {
        match self {
            Segment::Info(info) => match info.duration_ns {
                Some(ns) => format!("Segment info ({:.3}s)", ns as f64 / 1_000_000_000.0),
                None => "Segment info".to_string(),
            },
            Segment::Track(t) => {
                let name_part = if t.name.is_empty() {
                    String::new()
                } else {
                    format!(" - {}", t.name)
                };
                format!(
                    "{} track {} [{}] ({}){}",
                    t.track_type, t.number, t.codec_id, t.language, name_part
                )
            }
            Segment::Attachment(a) => format!("Attachment {} - {}", a.id, a.file_name),
            Segment::Chapter(c) => format!("Chapters ({} entries)", c.entry_count),
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_ids_are_stable_and_ordered() {
        let video = Segment::Track(TrackSegment::new(0, TrackType::Video, "V_MPEG4/ISO/AVC"));
        let font = Segment::Attachment(AttachmentSegment::new(1, "a.ttf", "font/ttf", 10));
        let chapters = Segment::Chapter(ChapterSegment { entry_count: 4 });

        assert_eq!(video.id(), SegmentId::Track(0));
        assert_eq!(font.id(), SegmentId::Attachment(1));
        assert_eq!(chapters.id(), SegmentId::Chapters);

        let mut ids = vec![chapters.id(), font.id(), video.id(), SegmentId::Info];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                SegmentId::Info,
                SegmentId::Track(0),
                SegmentId::Attachment(1),
                SegmentId::Chapters
            ]
        );
    }

    #[test]
    fn info_is_not_extractable() {
        assert!(!Segment::Info(SegmentInfo::default()).is_extractable());
        assert!(Segment::Chapter(ChapterSegment::default()).is_extractable());
    }

    #[test]
    fn track_display_name_with_name() {
        let track = Segment::Track(
            TrackSegment::new(1, TrackType::Audio, "A_AAC")
                .with_language("jpn")
                .with_name("Japanese 2.0"),
        );
        assert_eq!(track.display_name(), "audio track 2 [A_AAC] (jpn) - Japanese 2.0");
    }

    #[test]
    fn segment_id_serializes_tagged() {
        let json = serde_json::to_string(&SegmentId::Track(3)).unwrap();
        assert_eq!(json, r#"{"kind":"track","id":3}"#);
        let back: SegmentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SegmentId::Track(3));
    }
}
