//! Data models for MKV Extract.
//!
//! This module contains the core data structures shared by every other
//! module:
//! - Enums for track types, extraction modes, chapter formats
//! - Segments as reported by the catalog (info, tracks, attachments, chapters)

mod enums;
mod segment;

// Re-export all public types
pub use enums::{
    ChapterFormat, CuesExtractionMode, ExtractionMode, TimecodesExtractionMode, TrackType,
};
pub use segment::{
    AttachmentSegment, ChapterSegment, Segment, SegmentId, SegmentInfo, TrackSegment,
};
