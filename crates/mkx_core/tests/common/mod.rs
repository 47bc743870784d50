//! Shared harness: a throwaway directory with a fake mkvextract.
//!
//! The fake tool appends every invocation to `invocations.log`, prints
//! mkvextract-style progress and track lines and creates the requested
//! output files.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use mkx_core::abort::AbortController;
use mkx_core::extraction::{EngineConfig, ExtractionEngine};
use mkx_core::jobs::{JobQueue, QueueEvent};
use mkx_core::logging::{DiagnosticLog, LogConfig};
use mkx_core::models::{
    AttachmentSegment, ChapterSegment, Segment, SegmentInfo, TrackSegment, TrackType,
};

/// Writing an executable while another test forks can fail with ETXTBSY,
/// so tests that create and run tools take turns.
static SERIAL: Mutex<()> = Mutex::new(());

pub fn serial_guard() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

pub const CHAPTER_XML: &str = "<?xml version=\"1.0\"?>\
<Chapters><EditionEntry>\
<ChapterAtom><ChapterTimeStart>00:00:00.000000000</ChapterTimeStart>\
<ChapterDisplay><ChapterString>Intro</ChapterString></ChapterDisplay></ChapterAtom>\
<ChapterAtom><ChapterTimeStart>00:01:30.500000000</ChapterTimeStart>\
<ChapterDisplay><ChapterString>Main</ChapterString></ChapterDisplay></ChapterAtom>\
</EditionEntry></Chapters>";

/// How the fake tool behaves.
#[derive(Clone, Copy)]
pub struct ToolBehavior {
    pub exit_code: i32,
    /// Seconds to sleep after the first progress line.
    pub delay: f32,
}

impl Default for ToolBehavior {
    fn default() -> Self {
        Self {
            exit_code: 0,
            delay: 0.0,
        }
    }
}

pub struct Harness {
    pub root: tempfile::TempDir,
    pub out: PathBuf,
    pub tool: PathBuf,
    pub log: PathBuf,
    _serial: MutexGuard<'static, ()>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tool(ToolBehavior::default())
    }

    pub fn with_tool(behavior: ToolBehavior) -> Self {
        let serial = serial_guard();
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let log = root.path().join("invocations.log");
        let tool = root.path().join("mkvextract");
        write_fake_tool(&tool, &log, behavior);

        Self {
            root,
            out,
            tool,
            log,
            _serial: serial,
        }
    }

    /// Create an (empty) source file.
    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    pub fn engine(&self, abort: AbortController) -> ExtractionEngine {
        let config = EngineConfig::default()
            .with_mkvextract(&self.tool)
            .with_abort_grace(Duration::from_millis(50));
        ExtractionEngine::new(config, DiagnosticLog::in_memory(LogConfig::default()), abort)
    }

    /// Queue recording every event it publishes.
    pub fn queue(&self, abort: AbortController) -> (JobQueue, Arc<Mutex<Vec<QueueEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let queue = JobQueue::new(self.engine(abort)).with_callback(Box::new(move |e| {
            sink.lock().unwrap().push(e.clone());
        }));
        (queue, events)
    }

    /// Invocations of the fake tool, one argument line each.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Sorted file names in the output directory.
    pub fn outputs(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn write_fake_tool(tool: &Path, log: &Path, behavior: ToolBehavior) {
    let delay = if behavior.delay > 0.0 {
        // Keep the pipes owned by the script alone so a kill closes them
        format!("sleep {} >/dev/null 2>&1", behavior.delay)
    } else {
        String::new()
    };
    let script = format!(
        r#"#!/bin/sh
echo "$*" >> '{log}'
if [ "$1" = "--ui-language" ]; then shift 2; fi
shift
mode="$1"
shift
echo "Progress: 10%"
{delay}
if [ {code} -ne 0 ]; then
  echo "Error: the file could not be opened"
  exit {code}
fi
for arg in "$@"; do
  case "$arg" in
    --*) ;;
    *:*)
      id="${{arg%%:*}}"
      out="${{arg#*:}}"
      echo "Extracting track $id with the CodecID 'X' to the file '$out'."
      printf 'data' > "$out"
      ;;
    *)
      if [ "$mode" = "chapters" ]; then
        printf '%s' '{xml}' > "$arg"
      else
        printf '\357\273\277text' > "$arg"
      fi
      ;;
  esac
done
echo "Progress: 100%"
exit 0
"#,
        log = log.display(),
        delay = delay,
        code = behavior.exit_code,
        xml = CHAPTER_XML,
    );

    fs::write(tool, script).unwrap();
    fs::set_permissions(tool, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Listing of a file with one video, one audio and one subtitle track,
/// an attachment and chapters.
pub fn movie_listing() -> Vec<Segment> {
    vec![
        Segment::Info(SegmentInfo {
            duration_ns: Some(1_440_000_000_000),
            ..SegmentInfo::default()
        }),
        Segment::Track(TrackSegment::new(0, TrackType::Video, "V_MPEG4/ISO/AVC").with_dimensions(1920, 1080)),
        Segment::Track(TrackSegment::new(1, TrackType::Audio, "A_AAC").with_language("jpn")),
        Segment::Track(TrackSegment::new(2, TrackType::Subtitles, "S_TEXT/UTF8").with_language("eng")),
        Segment::Attachment(AttachmentSegment::new(1, "font.ttf", "font/ttf", 4096)),
        Segment::Chapter(ChapterSegment { entry_count: 2 }),
    ]
}

pub fn tracks(listing: &[Segment]) -> Vec<Segment> {
    listing
        .iter()
        .filter(|s| s.as_track().is_some())
        .cloned()
        .collect()
}
