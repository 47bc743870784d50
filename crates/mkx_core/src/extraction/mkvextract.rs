//! mkvextract command line and output protocol.
//!
//! Builds the argument list for one invocation and classifies the lines
//! mkvextract prints on stdout.

use std::ffi::OsString;
use std::path::Path;

use super::plan::PlannedUnit;

/// mkvextract extraction modes used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolMode {
    Tracks,
    Attachments,
    Chapters,
    Tags,
    Cuesheet,
    TimecodesV2,
    TimestampsV2,
    Cues,
}

impl ToolMode {
    /// Mode word on the mkvextract command line.
    pub fn as_arg(&self) -> &'static str {
        match self {
            ToolMode::Tracks => "tracks",
            ToolMode::Attachments => "attachments",
            ToolMode::Chapters => "chapters",
            ToolMode::Tags => "tags",
            ToolMode::Cuesheet => "cuesheet",
            ToolMode::TimecodesV2 => "timecodes_v2",
            ToolMode::TimestampsV2 => "timestamps_v2",
            ToolMode::Cues => "cues",
        }
    }

    /// Whether targets are given as `ID:path` specs.
    pub fn takes_ids(&self) -> bool {
        matches!(
            self,
            ToolMode::Tracks
                | ToolMode::Attachments
                | ToolMode::TimecodesV2
                | ToolMode::TimestampsV2
                | ToolMode::Cues
        )
    }
}

impl std::fmt::Display for ToolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_arg())
    }
}

/// Build the argument list for one unit.
///
/// Layout: `--ui-language <lang> <source> <mode> [flags] <specs...>`.
pub fn build_args(ui_language: &str, source: &Path, unit: &PlannedUnit) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(4 + unit.flags.len() + unit.targets.len());

    if !ui_language.is_empty() {
        args.push("--ui-language".into());
        args.push(ui_language.into());
    }
    args.push(source.as_os_str().to_os_string());
    args.push(unit.mode.as_arg().into());

    for flag in &unit.flags {
        args.push(flag.into());
    }

    for target in &unit.targets {
        let path = target.tool_path();
        match target.id {
            Some(id) if unit.mode.takes_ids() => {
                let mut spec = OsString::from(format!("{}:", id));
                spec.push(path.as_os_str());
                args.push(spec);
            }
            _ => args.push(path.as_os_str().to_os_string()),
        }
    }

    args
}

/// Render an argument list for the log.
pub fn display_command(program: &Path, args: &[OsString]) -> String {
    let mut out = program.display().to_string();
    for arg in args {
        let arg = arg.to_string_lossy();
        out.push(' ');
        if arg.contains(' ') {
            out.push('"');
            out.push_str(&arg);
            out.push('"');
        } else {
            out.push_str(&arg);
        }
    }
    out
}

/// A classified line of mkvextract stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolLine {
    /// Progress of the current invocation, 0..=100.
    Progress(u8),
    /// The tool started writing the given track (or its timestamps/cues).
    TrackStarted(u64),
    /// Anything else.
    Other,
}

/// Classify one line of tool output.
///
/// Recognizes `Progress: N%`, `#GUI#progress N%` and `Extracting ...
/// track N ...`. Everything else is [`ToolLine::Other`].
pub fn classify_line(line: &str) -> ToolLine {
    let line = line.trim();

    let progress = line
        .strip_prefix("Progress:")
        .or_else(|| line.strip_prefix("#GUI#progress"));
    if let Some(rest) = progress {
        if let Some(pct) = rest.trim().strip_suffix('%').and_then(|n| n.trim().parse::<u32>().ok()) {
            return ToolLine::Progress(pct.min(100) as u8);
        }
        return ToolLine::Other;
    }

    if line.starts_with("Extracting") {
        if let Some(idx) = line.find(" track ") {
            let digits: String = line[idx + 7..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(id) = digits.parse() {
                return ToolLine::TrackStarted(id);
            }
        }
    }

    ToolLine::Other
}

/// Get the appropriate file extension for a track codec.
pub fn extension_for_codec(codec_id: &str) -> &'static str {
    match codec_id {
        // Video codecs
        "V_MPEG4/ISO/AVC" => "h264",
        "V_MPEGH/ISO/HEVC" => "h265",
        "V_MS/VFW/FOURCC" => "avi",
        "V_VP8" | "V_VP9" => "ivf",
        "V_AV1" => "obu",
        "V_MPEG1" | "V_MPEG2" => "mpg",
        "V_REAL/RV10" | "V_REAL/RV20" | "V_REAL/RV30" | "V_REAL/RV40" => "rm",
        "V_THEORA" => "ogv",

        // Audio codecs
        "A_AAC" | "A_AAC/MPEG2/LC" | "A_AAC/MPEG4/LC" | "A_AAC/MPEG4/LC/SBR" => "aac",
        "A_AC3" | "A_EAC3" => "ac3",
        "A_DTS" => "dts",
        "A_FLAC" => "flac",
        "A_OPUS" => "opus",
        "A_VORBIS" => "ogg",
        "A_PCM/INT/LIT" | "A_PCM/INT/BIG" | "A_PCM/FLOAT/IEEE" => "wav",
        "A_MPEG/L3" => "mp3",
        "A_MPEG/L2" => "mp2",
        "A_TRUEHD" | "A_MLP" => "thd",
        "A_TTA1" => "tta",
        "A_WAVPACK4" => "wv",

        // Subtitle codecs
        "S_TEXT/UTF8" | "S_TEXT/ASCII" => "srt",
        "S_TEXT/SSA" | "S_TEXT/ASS" | "S_SSA" | "S_ASS" => "ass",
        "S_TEXT/WEBVTT" => "vtt",
        "S_TEXT/USF" => "usf",
        "S_VOBSUB" => "sub",
        "S_HDMV/PGS" => "sup",
        "S_HDMV/TEXTST" => "textst",
        "S_KATE" => "ogg",

        // Default
        _ => "bin",
    }
}
