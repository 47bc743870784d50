//! Chapter types and error definitions.

use serde::{Deserialize, Serialize};

/// A single chapter entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEntry {
    /// Chapter start time in nanoseconds.
    pub start_ns: u64,
    /// Chapter end time in nanoseconds (optional).
    pub end_ns: Option<u64>,
    /// First display string of the chapter.
    pub title: Option<String>,
    /// Hidden or disabled chapters are not listed by players.
    pub hidden: bool,
}

impl ChapterEntry {
    /// Create a new chapter entry with the given start time.
    pub fn new(start_ns: u64) -> Self {
        Self {
            start_ns,
            end_ns: None,
            title: None,
            hidden: false,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Get the start time in milliseconds.
    pub fn start_ms(&self) -> u64 {
        self.start_ns / 1_000_000
    }
}

/// Chapters of all editions, sorted by start time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterList {
    pub chapters: Vec<ChapterEntry>,
}

impl ChapterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chapter: ChapterEntry) {
        self.chapters.push(chapter);
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Sort chapters by start time (stable).
    pub fn sort_by_time(&mut self) {
        self.chapters.sort_by_key(|c| c.start_ns);
    }

    /// Chapters a player would list.
    pub fn visible(&self) -> impl Iterator<Item = &ChapterEntry> {
        self.chapters.iter().filter(|c| !c.hidden)
    }
}

/// Error types for chapter operations.
#[derive(Debug, thiserror::Error)]
pub enum ChapterError {
    /// Chapter XML is malformed.
    #[error("Malformed chapter XML: {0}")]
    MalformedXml(String),

    /// No chapters found in source.
    #[error("No chapters found in source")]
    NoChapters,

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Type alias for chapter operation results.
pub type ChapterResult<T> = Result<T, ChapterError>;

/// Parse a timestamp string (HH:MM:SS.nnnnnnnnn) to nanoseconds.
pub fn parse_timestamp_ns(time_str: &str) -> Option<u64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;

    let (secs, frac) = parts[2].split_once('.').unwrap_or((parts[2], ""));
    let seconds: u64 = secs.parse().ok()?;
    let nanos: u64 = if frac.is_empty() {
        0
    } else {
        // Pad or truncate to 9 digits
        let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
        digits.parse().ok()?
    };

    Some((hours * 3600 + minutes * 60 + seconds) * 1_000_000_000 + nanos)
}
