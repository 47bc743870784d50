//! Segment discovery using `mkvmerge -J`.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

use crate::models::{
    AttachmentSegment, ChapterSegment, Segment, SegmentInfo, TrackSegment, TrackType,
};

use super::source::{Catalog, CatalogError, CatalogResult};

/// Catalog that asks mkvmerge for the container's identification JSON.
#[derive(Debug, Clone)]
pub struct MkvMergeCatalog {
    mkvmerge: PathBuf,
}

impl Default for MkvMergeCatalog {
    fn default() -> Self {
        Self::new("mkvmerge")
    }
}

impl MkvMergeCatalog {
    pub fn new(mkvmerge: impl Into<PathBuf>) -> Self {
        Self {
            mkvmerge: mkvmerge.into(),
        }
    }
}

impl Catalog for MkvMergeCatalog {
    fn discover(&self, path: &Path) -> CatalogResult<Vec<Segment>> {
        if !path.is_file() {
            return Err(CatalogError::unreadable(path, "file not found"));
        }

        tracing::debug!("Identifying file: {}", path.display());

        let output = Command::new(&self.mkvmerge)
            .arg("-J")
            .arg(path)
            .output()
            .map_err(|e| {
                CatalogError::unreadable(
                    path,
                    format!("failed to run {}: {}", self.mkvmerge.display(), e),
                )
            })?;

        // mkvmerge -J reports identification errors in the JSON on stdout
        let json: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            CatalogError::unreadable(path, format!("invalid mkvmerge output: {} {}", e, stderr.trim()))
        })?;

        if !output.status.success() {
            let reason = json
                .get("errors")
                .and_then(|e| e.as_array())
                .and_then(|e| e.first())
                .and_then(|e| e.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("mkvmerge exited with {}", output.status));
            return Err(CatalogError::unreadable(path, reason));
        }

        parse_identification(&json).ok_or_else(|| {
            CatalogError::unreadable(path, "not a recognized container")
        })
    }
}

/// Map mkvmerge identification JSON to segments.
///
/// Returns `None` when the file was not recognized.
pub(crate) fn parse_identification(json: &Value) -> Option<Vec<Segment>> {
    let container = json.get("container")?;
    if !container.get("recognized").and_then(Value::as_bool).unwrap_or(true) {
        return None;
    }

    let mut segments = vec![Segment::Info(parse_info(container.get("properties")))];

    if let Some(tracks) = json.get("tracks").and_then(Value::as_array) {
        segments.extend(tracks.iter().filter_map(parse_track).map(Segment::Track));
    }

    if let Some(attachments) = json.get("attachments").and_then(Value::as_array) {
        segments.extend(
            attachments
                .iter()
                .filter_map(parse_attachment)
                .map(Segment::Attachment),
        );
    }

    if let Some(chapters) = json.get("chapters").and_then(Value::as_array) {
        if !chapters.is_empty() {
            let entry_count = chapters
                .iter()
                .filter_map(|c| c.get("num_entries").and_then(Value::as_u64))
                .sum::<u64>() as usize;
            segments.push(Segment::Chapter(ChapterSegment { entry_count }));
        }
    }

    Some(segments)
}

fn str_prop(props: Option<&Value>, key: &str) -> Option<String> {
    props
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_info(props: Option<&Value>) -> SegmentInfo {
    SegmentInfo {
        duration_ns: props.and_then(|p| p.get("duration")).and_then(Value::as_u64),
        muxing_application: str_prop(props, "muxing_application").unwrap_or_default(),
        writing_application: str_prop(props, "writing_application").unwrap_or_default(),
        date: str_prop(props, "date_utc"),
    }
}

/// Nanoseconds to whole milliseconds, rounded.
fn ns_to_ms(ns: i64) -> i64 {
    (ns as f64 / 1_000_000.0).round() as i64
}

fn parse_track(track: &Value) -> Option<TrackSegment> {
    let id = track.get("id")?.as_u64()?;
    let track_type = TrackType::from_mkvmerge(track.get("type")?.as_str()?);
    let props = track.get("properties");

    let codec_id = str_prop(props, "codec_id").unwrap_or_default();
    let mut seg = TrackSegment::new(id, track_type, codec_id);

    if let Some(number) = props.and_then(|p| p.get("number")).and_then(Value::as_u64) {
        seg.number = number;
    }
    seg.codec = track
        .get("codec")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Some(language) = str_prop(props, "language") {
        seg.language = language;
    }
    seg.language_ietf = str_prop(props, "language_ietf");
    seg.name = str_prop(props, "track_name").unwrap_or_default();
    seg.forced = props
        .and_then(|p| p.get("forced_track"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // Container delay from minimum_timestamp (nanoseconds -> milliseconds)
    seg.delay_ms = props
        .and_then(|p| p.get("minimum_timestamp"))
        .and_then(Value::as_i64)
        .map(ns_to_ms)
        .unwrap_or(0);
    let codec_delay_ms = props
        .and_then(|p| p.get("codec_delay"))
        .and_then(Value::as_i64)
        .map(ns_to_ms)
        .unwrap_or(0);
    seg.effective_delay_ms = seg.delay_ms + codec_delay_ms;

    match track_type {
        TrackType::Video => {
            let dims = str_prop(props, "pixel_dimensions");
            if let Some((w, h)) = dims.as_deref().and_then(|d| d.split_once('x')) {
                seg.pixel_width = w.parse().ok();
                seg.pixel_height = h.parse().ok();
            }
        }
        TrackType::Audio => {
            seg.sampling_frequency = props
                .and_then(|p| p.get("audio_sampling_frequency"))
                .and_then(Value::as_f64);
            seg.channels = props
                .and_then(|p| p.get("audio_channels"))
                .and_then(Value::as_u64)
                .map(|c| c as u32);
        }
        TrackType::Subtitles | TrackType::Unknown => {}
    }

    Some(seg)
}

fn parse_attachment(attachment: &Value) -> Option<AttachmentSegment> {
    let id = attachment.get("id")?.as_u64()?;
    let file_name = attachment.get("file_name")?.as_str()?;

    let mime_type = attachment
        .get("content_type")
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream");

    let size = attachment.get("size").and_then(Value::as_u64).unwrap_or(0);

    Some(AttachmentSegment::new(id, file_name, mime_type, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SegmentId;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "container": {
                "recognized": true,
                "type": "Matroska",
                "properties": {
                    "duration": 1_420_000_000_000u64,
                    "muxing_application": "libebml v1.4.4 + libmatroska v1.7.1",
                    "writing_application": "mkvmerge v80.0",
                    "date_utc": "2024-01-02T03:04:05Z"
                }
            },
            "tracks": [
                {
                    "id": 0, "type": "video", "codec": "AVC/H.264/MPEG-4p10",
                    "properties": {
                        "number": 1, "codec_id": "V_MPEG4/ISO/AVC",
                        "language": "und", "pixel_dimensions": "1920x1080"
                    }
                },
                {
                    "id": 1, "type": "audio", "codec": "AAC",
                    "properties": {
                        "number": 2, "codec_id": "A_AAC", "language": "jpn",
                        "language_ietf": "ja", "track_name": "Stereo",
                        "minimum_timestamp": 41_700_000, "codec_delay": 10_000_000,
                        "audio_sampling_frequency": 48000, "audio_channels": 2
                    }
                },
                {
                    "id": 2, "type": "subtitles", "codec": "SubStationAlpha",
                    "properties": {
                        "number": 3, "codec_id": "S_TEXT/ASS", "language": "eng",
                        "forced_track": true
                    }
                }
            ],
            "attachments": [
                { "id": 1, "file_name": "font.ttf", "content_type": "font/ttf", "size": 1234 }
            ],
            "chapters": [ { "num_entries": 6 } ]
        })
    }

    #[test]
    fn maps_all_segment_kinds() {
        let segments = parse_identification(&sample()).unwrap();
        let ids: Vec<SegmentId> = segments.iter().map(Segment::id).collect();
        assert_eq!(
            ids,
            vec![
                SegmentId::Info,
                SegmentId::Track(0),
                SegmentId::Track(1),
                SegmentId::Track(2),
                SegmentId::Attachment(1),
                SegmentId::Chapters,
            ]
        );

        match &segments[0] {
            Segment::Info(info) => {
                assert_eq!(info.duration_ns, Some(1_420_000_000_000));
                assert_eq!(info.date.as_deref(), Some("2024-01-02T03:04:05Z"));
            }
            other => panic!("expected info, got {:?}", other),
        }
        match &segments[5] {
            Segment::Chapter(c) => assert_eq!(c.entry_count, 6),
            other => panic!("expected chapters, got {:?}", other),
        }
    }

    #[test]
    fn maps_track_properties() {
        let segments = parse_identification(&sample()).unwrap();

        let video = segments[1].as_track().unwrap();
        assert_eq!(video.pixel_width, Some(1920));
        assert_eq!(video.pixel_height, Some(1080));
        assert_eq!(video.codec, "AVC/H.264/MPEG-4p10");

        let audio = segments[2].as_track().unwrap();
        assert_eq!(audio.number, 2);
        assert_eq!(audio.language, "jpn");
        assert_eq!(audio.language_ietf.as_deref(), Some("ja"));
        assert_eq!(audio.delay_ms, 42);
        assert_eq!(audio.effective_delay_ms, 52);
        assert_eq!(audio.sampling_frequency, Some(48000.0));
        assert_eq!(audio.channels, Some(2));

        let subs = segments[3].as_track().unwrap();
        assert!(subs.forced);
        assert_eq!(subs.track_type, TrackType::Subtitles);
    }

    #[test]
    fn unrecognized_container_is_rejected() {
        let json = json!({ "container": { "recognized": false } });
        assert!(parse_identification(&json).is_none());
    }

    #[test]
    fn missing_file_is_unreadable() {
        let catalog = MkvMergeCatalog::default();
        let err = catalog.discover(Path::new("/does/not/exist.mkv")).unwrap_err();
        assert!(matches!(err, CatalogError::UnreadableContainer { .. }));
    }
}
