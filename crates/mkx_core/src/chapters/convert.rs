//! Conversion of chapter XML to CUE sheets and PotPlayer bookmarks.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::parser::parse_chapter_file;
use super::types::{ChapterList, ChapterResult};

/// CUE frames per second.
const CUE_FPS: u64 = 75;

/// Format milliseconds as a CUE index position (`mm:ss:ff`).
fn cue_position(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    let frames = (ms % 1000) * CUE_FPS / 1000;
    format!("{:02}:{:02}:{:02}", minutes, seconds, frames)
}

fn cue_quote(value: &str) -> String {
    value.replace('"', "'")
}

/// Render chapters as a CUE sheet referencing `media_file`.
pub fn to_cue(list: &ChapterList, media_file: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "FILE \"{}\" WAVE", cue_quote(media_file));

    for (i, chapter) in list.visible().enumerate() {
        let number = i + 1;
        let title = chapter
            .title
            .clone()
            .unwrap_or_else(|| format!("Chapter {:02}", number));

        let _ = writeln!(out, "  TRACK {:02} AUDIO", number);
        let _ = writeln!(out, "    TITLE \"{}\"", cue_quote(&title));
        let _ = writeln!(out, "    INDEX 01 {}", cue_position(chapter.start_ms()));
    }
    out
}

/// Render chapters as a PotPlayer bookmark file.
pub fn to_pbf(list: &ChapterList) -> String {
    let mut out = String::from("[Bookmark]\n");
    for (i, chapter) in list.visible().enumerate() {
        let title = chapter
            .title
            .clone()
            .unwrap_or_else(|| format!("Chapter {:02}", i + 1));
        let _ = writeln!(out, "{}={}*{}*", i, chapter.start_ms(), title);
    }
    out
}

/// Output format for [`convert_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertTarget {
    Cue,
    Pbf,
}

/// Read chapter XML from `xml_path` and write `dest` in the target format.
///
/// `media_file` is the name a CUE sheet refers to. Returns the number of
/// chapters written.
pub fn convert_file(
    xml_path: &Path,
    dest: &Path,
    target: ConvertTarget,
    media_file: &str,
) -> ChapterResult<usize> {
    let list = parse_chapter_file(xml_path)?;

    let content = match target {
        ConvertTarget::Cue => to_cue(&list, media_file),
        ConvertTarget::Pbf => to_pbf(&list),
    };

    fs::write(dest, content)?;
    Ok(list.visible().count())
}
