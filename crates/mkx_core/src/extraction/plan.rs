//! Pre-flight planning of an extraction request.
//!
//! A plan lists one unit per mkvextract invocation with every output
//! path already resolved. Planning touches the filesystem only to check
//! that the source and output directory exist and that no output would be
//! overwritten against the request's policy.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::chapters::ConvertTarget;
use crate::models::{
    ChapterFormat, CuesExtractionMode, ExtractionMode, Segment, SegmentInfo,
    TimecodesExtractionMode,
};
use crate::params::{path_key, ExtractionParameters};
use crate::patterns::{render, FileContext};

use super::mkvextract::{extension_for_codec, ToolMode};
use super::types::{ExtractionError, ExtractionResult};

/// One output of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTarget {
    /// Track or attachment ID for `ID:path` specs.
    pub id: Option<u64>,
    /// Final output path.
    pub output: PathBuf,
    /// Where the tool writes, when it differs from `output`.
    pub tool_output: Option<PathBuf>,
    /// Human-readable segment name for track-started events.
    pub label: String,
    /// Text output (subject to BOM stripping).
    pub text: bool,
}

impl UnitTarget {
    pub fn new(id: Option<u64>, output: PathBuf, label: impl Into<String>, text: bool) -> Self {
        Self {
            id,
            output,
            tool_output: None,
            label: label.into(),
            text,
        }
    }

    /// Path handed to mkvextract.
    pub fn tool_path(&self) -> &Path {
        self.tool_output.as_deref().unwrap_or(&self.output)
    }
}

/// Work done after a unit's invocation succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostStep {
    /// Convert the extracted chapter XML, then delete it.
    ConvertChapters {
        target: ConvertTarget,
        media_file: String,
    },
}

/// One mkvextract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUnit {
    pub mode: ToolMode,
    pub flags: Vec<String>,
    pub targets: Vec<UnitTarget>,
    /// Names announced when the unit starts (the tool does not announce them).
    pub announce: Vec<String>,
    pub post: Option<PostStep>,
}

impl PlannedUnit {
    fn new(mode: ToolMode, targets: Vec<UnitTarget>) -> Self {
        Self {
            mode,
            flags: Vec::new(),
            targets,
            announce: Vec::new(),
            post: None,
        }
    }

    /// Label of the target with the given ID.
    pub fn label_for(&self, id: u64) -> Option<&str> {
        self.targets
            .iter()
            .find(|t| t.id == Some(id))
            .map(|t| t.label.as_str())
    }
}

/// Resolved invocations for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub source_file: PathBuf,
    pub output_directory: PathBuf,
    pub units: Vec<PlannedUnit>,
    pub strip_bom: bool,
}

impl ExtractionPlan {
    /// Every final output path, in unit order.
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.units
            .iter()
            .flat_map(|u| u.targets.iter().map(|t| t.output.as_path()))
    }
}

/// Resolve a request into invocations and run the pre-flight checks.
///
/// Fails with `DestinationExists` when overwriting is off and any output,
/// or temporary file the tool writes, already exists, before anything is
/// written. Outputs that differ only in case are duplicates.
pub fn plan(params: &ExtractionParameters) -> ExtractionResult<ExtractionPlan> {
    let source = params.source_file();
    if !source.is_file() {
        return Err(ExtractionError::SourceMissing {
            path: source.to_path_buf(),
        });
    }

    let dir = &params.output_directory;
    if !dir.is_dir() {
        return Err(ExtractionError::OutputDirectoryMissing { path: dir.clone() });
    }

    let planner = Planner {
        params,
        ctx: FileContext::new(source),
        dir,
    };
    let units = planner.units()?;

    if units.is_empty() {
        return Err(ExtractionError::NothingToExtract { mode: params.mode });
    }

    let plan = ExtractionPlan {
        source_file: source.to_path_buf(),
        output_directory: dir.clone(),
        units,
        strip_bom: params.disable_bom_for_text,
    };

    check_outputs(&plan, params.overwrite_existing)?;
    Ok(plan)
}

fn check_outputs(plan: &ExtractionPlan, overwrite: bool) -> ExtractionResult<()> {
    let mut seen = HashSet::new();
    let written = plan.units.iter().flat_map(|u| u.targets.iter()).flat_map(|t| {
        std::iter::once(t.output.as_path()).chain(t.tool_output.as_deref())
    });
    for output in written {
        if !seen.insert(path_key(output)) {
            return Err(ExtractionError::DuplicateOutput {
                path: output.to_path_buf(),
            });
        }
        if !overwrite && output.exists() {
            return Err(ExtractionError::DestinationExists {
                path: output.to_path_buf(),
            });
        }
    }
    Ok(())
}

struct Planner<'a> {
    params: &'a ExtractionParameters,
    ctx: FileContext,
    dir: &'a Path,
}

impl Planner<'_> {
    fn units(&self) -> ExtractionResult<Vec<PlannedUnit>> {
        let segments = self.params.segments();
        let tracks: Vec<&Segment> = segments.iter().filter(|s| s.as_track().is_some()).collect();
        let attachments: Vec<&Segment> = segments
            .iter()
            .filter(|s| s.as_attachment().is_some())
            .collect();
        let chapter = segments.iter().find(|s| matches!(s, Segment::Chapter(_)));

        let mut units = Vec::new();
        match self.params.mode {
            ExtractionMode::Tracks => {
                if !tracks.is_empty() {
                    units.push(self.track_unit(&tracks)?);
                }
                if !attachments.is_empty() {
                    units.push(self.attachment_unit(&attachments)?);
                }
                if let Some(chapter) = chapter {
                    units.push(self.chapter_unit(chapter)?);
                }
            }
            ExtractionMode::Tags => units.push(self.tags_unit()?),
            ExtractionMode::Attachments => {
                if !attachments.is_empty() {
                    units.push(self.attachment_unit(&attachments)?);
                }
            }
            ExtractionMode::Chapters => {
                if let Some(chapter) = chapter {
                    units.push(self.chapter_unit(chapter)?);
                }
            }
            ExtractionMode::CueSheet => {
                if let Some(chapter) = chapter {
                    units.push(self.cuesheet_unit(chapter)?);
                }
            }
            ExtractionMode::TimecodesV2 => {
                if !tracks.is_empty() {
                    units.push(self.sidecar_unit(ToolMode::TimecodesV2, &tracks, "tc.txt")?);
                }
            }
            ExtractionMode::TimestampsV2 => {
                if !tracks.is_empty() {
                    units.push(self.sidecar_unit(ToolMode::TimestampsV2, &tracks, "tc.txt")?);
                }
            }
            ExtractionMode::Cues => {
                if !tracks.is_empty() {
                    units.push(self.sidecar_unit(ToolMode::Cues, &tracks, "cues.txt")?);
                }
            }
        }
        Ok(units)
    }

    /// Resolve `<dir>/<rendered template>[.suffix]`.
    fn output_path(&self, template: &str, segment: &Segment, suffix: &str) -> ExtractionResult<PathBuf> {
        let name = render(template, segment, &self.ctx);
        validate_name(&name)?;

        let file = if suffix.is_empty() {
            name
        } else {
            format!("{}.{}", name, suffix)
        };
        Ok(self.dir.join(file))
    }

    fn track_unit(&self, tracks: &[&Segment]) -> ExtractionResult<PlannedUnit> {
        if self.params.timecodes_mode == TimecodesExtractionMode::OnlyTimecodes {
            return self.sidecar_unit(ToolMode::TimestampsV2, tracks, "tc.txt");
        }
        if self.params.cues_mode == CuesExtractionMode::OnlyCues {
            return self.sidecar_unit(ToolMode::Cues, tracks, "cues.txt");
        }

        let patterns = &self.params.filename_patterns;
        let mut targets = Vec::with_capacity(tracks.len());
        for segment in tracks {
            let Some(track) = segment.as_track() else { continue };
            let path = self.output_path(
                patterns.for_segment(segment),
                segment,
                extension_for_codec(&track.codec_id),
            )?;
            targets.push(UnitTarget::new(
                Some(track.id),
                path,
                segment.display_name(),
                track.is_text(),
            ));
        }

        let mut unit = PlannedUnit::new(ToolMode::Tracks, targets);
        if self.params.use_full_raw {
            unit.flags.push("--fullraw".to_string());
        } else if self.params.use_raw {
            unit.flags.push("--raw".to_string());
        }
        Ok(unit)
    }

    /// Timestamp or cue files, one per track.
    fn sidecar_unit(&self, mode: ToolMode, tracks: &[&Segment], suffix: &str) -> ExtractionResult<PlannedUnit> {
        let patterns = &self.params.filename_patterns;
        let mut targets = Vec::with_capacity(tracks.len());
        for segment in tracks {
            let Some(track) = segment.as_track() else { continue };
            let path = self.output_path(patterns.for_segment(segment), segment, suffix)?;
            targets.push(UnitTarget::new(Some(track.id), path, segment.display_name(), true));
        }
        Ok(PlannedUnit::new(mode, targets))
    }

    fn attachment_unit(&self, attachments: &[&Segment]) -> ExtractionResult<PlannedUnit> {
        let mut targets = Vec::with_capacity(attachments.len());
        for segment in attachments {
            let Some(attachment) = segment.as_attachment() else { continue };
            let path = self.output_path(&self.params.filename_patterns.attachment, segment, "")?;
            targets.push(UnitTarget::new(Some(attachment.id), path, segment.display_name(), false));
        }

        let mut unit = PlannedUnit::new(ToolMode::Attachments, targets);
        unit.announce = unit.targets.iter().map(|t| t.label.clone()).collect();
        Ok(unit)
    }

    fn chapter_unit(&self, chapter: &Segment) -> ExtractionResult<PlannedUnit> {
        let format = self.params.chapter_format;
        let label = chapter.display_name();
        let output = self.output_path(&self.params.filename_patterns.chapter, chapter, format.extension())?;
        let mut target = UnitTarget::new(None, output, label.clone(), true);

        let mut flags = Vec::new();
        let mut post = None;
        match format {
            ChapterFormat::Xml => {}
            ChapterFormat::Ogm => flags.push("--simple".to_string()),
            ChapterFormat::Cue | ChapterFormat::Pbf => {
                let file_name = target
                    .output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                target.tool_output = Some(target.output.with_file_name(format!("{}.tmp.xml", file_name)));
                post = Some(PostStep::ConvertChapters {
                    target: if format == ChapterFormat::Cue {
                        ConvertTarget::Cue
                    } else {
                        ConvertTarget::Pbf
                    },
                    media_file: self.ctx.file_name(),
                });
            }
        }

        Ok(PlannedUnit {
            mode: ToolMode::Chapters,
            flags,
            targets: vec![target],
            announce: vec![label],
            post,
        })
    }

    fn cuesheet_unit(&self, chapter: &Segment) -> ExtractionResult<PlannedUnit> {
        let output = self.output_path(&self.params.filename_patterns.chapter, chapter, "cue")?;
        let label = "Cue sheet".to_string();
        let mut unit = PlannedUnit::new(ToolMode::Cuesheet, vec![UnitTarget::new(None, output, label.clone(), true)]);
        unit.announce = vec![label];
        Ok(unit)
    }

    fn tags_unit(&self) -> ExtractionResult<PlannedUnit> {
        // Tags belong to the whole file; only file-level placeholders apply
        let info = Segment::Info(SegmentInfo::default());
        let output = self.output_path(&self.params.filename_patterns.tags, &info, "xml")?;
        let label = "Tags".to_string();
        let mut unit = PlannedUnit::new(ToolMode::Tags, vec![UnitTarget::new(None, output, label.clone(), true)]);
        unit.announce = vec![label];
        Ok(unit)
    }
}

/// Rendered names must stay inside the output directory.
fn validate_name(name: &str) -> ExtractionResult<()> {
    let invalid = || ExtractionError::InvalidOutputName {
        name: name.to_string(),
    };

    let path = Path::new(name);
    if name.trim().is_empty() || path.file_name().is_none() {
        return Err(invalid());
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentSegment, ChapterSegment, TrackSegment, TrackType};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        source: PathBuf,
        out: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let source = dir.path().join("Movie.mkv");
        fs::write(&source, b"").unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        Fixture { dir, source, out }
    }

    fn segments() -> Vec<Segment> {
        vec![
            Segment::Track(TrackSegment::new(0, TrackType::Video, "V_MPEG4/ISO/AVC")),
            Segment::Track(TrackSegment::new(1, TrackType::Audio, "A_AAC").with_language("jpn")),
            Segment::Track(TrackSegment::new(2, TrackType::Subtitles, "S_TEXT/ASS").with_language("eng")),
        ]
    }

    #[test]
    fn tracks_mode_plans_one_invocation() {
        let f = fixture();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(segments())
            .build()
            .unwrap();

        let plan = plan(&params).unwrap();
        assert_eq!(plan.units.len(), 1);
        let unit = &plan.units[0];
        assert_eq!(unit.mode, ToolMode::Tracks);

        let names: Vec<String> = plan
            .outputs()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["Movie_track01_und.h264", "Movie_track02_jpn.aac", "Movie_track03_eng.ass"]
        );
        assert!(unit.targets[2].text);
        assert!(!unit.targets[0].text);
        assert_eq!(unit.label_for(1), Some("audio track 2 [A_AAC] (jpn)"));
    }

    #[test]
    fn tracks_mode_adds_attachment_and_chapter_units() {
        let f = fixture();
        let mut all = segments();
        all.push(Segment::Attachment(AttachmentSegment::new(1, "font.ttf", "font/ttf", 1)));
        all.push(Segment::Chapter(ChapterSegment { entry_count: 4 }));

        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(all)
            .raw(true, true)
            .build()
            .unwrap();

        let plan = plan(&params).unwrap();
        let modes: Vec<ToolMode> = plan.units.iter().map(|u| u.mode).collect();
        assert_eq!(modes, vec![ToolMode::Tracks, ToolMode::Attachments, ToolMode::Chapters]);
        assert_eq!(plan.units[0].flags, vec!["--fullraw".to_string()]);
        assert_eq!(plan.units[1].targets[0].output, f.out.join("font.ttf"));
        assert_eq!(plan.units[2].targets[0].output, f.out.join("Movie_chapters.xml"));
    }

    #[test]
    fn chapters_mode_converts_through_temp_xml() {
        let f = fixture();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segment(Segment::Chapter(ChapterSegment { entry_count: 2 }))
            .mode(ExtractionMode::Chapters)
            .chapter_format(ChapterFormat::Pbf)
            .build()
            .unwrap();

        let plan = plan(&params).unwrap();
        let target = &plan.units[0].targets[0];
        assert_eq!(target.output, f.out.join("Movie_chapters.pbf"));
        assert_eq!(target.tool_path(), f.out.join("Movie_chapters.pbf.tmp.xml"));
        assert!(matches!(
            plan.units[0].post,
            Some(PostStep::ConvertChapters { target: ConvertTarget::Pbf, .. })
        ));
    }

    #[test]
    fn sidecar_modes_use_track_templates() {
        let f = fixture();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(segments())
            .mode(ExtractionMode::TimestampsV2)
            .build()
            .unwrap();
        let timestamps = plan(&params).unwrap();
        assert_eq!(timestamps.units[0].mode, ToolMode::TimestampsV2);
        assert_eq!(
            timestamps.units[0].targets[1].output,
            f.out.join("Movie_track02_jpn.tc.txt")
        );

        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(segments())
            .cues(CuesExtractionMode::OnlyCues)
            .build()
            .unwrap();
        let cues = plan(&params).unwrap();
        assert_eq!(cues.units[0].mode, ToolMode::Cues);
    }

    #[test]
    fn tags_mode_uses_file_level_template() {
        let f = fixture();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(segments())
            .mode(ExtractionMode::Tags)
            .build()
            .unwrap();
        let plan = plan(&params).unwrap();
        assert_eq!(plan.units.len(), 1);
        assert_eq!(plan.units[0].targets[0].output, f.out.join("Movie_tags.xml"));
        assert_eq!(plan.units[0].announce, vec!["Tags".to_string()]);
    }

    #[test]
    fn existing_output_fails_without_overwrite() {
        let f = fixture();
        fs::write(f.out.join("Movie_track02_jpn.aac"), b"old").unwrap();

        let builder = ExtractionParameters::builder(&f.source, &f.out).segments(segments());
        let err = plan(&builder.clone().build().unwrap()).unwrap_err();
        assert!(matches!(err, ExtractionError::DestinationExists { .. }));

        assert!(plan(&builder.overwrite_existing(true).build().unwrap()).is_ok());
    }

    #[test]
    fn leftover_temp_chapters_count_as_existing() {
        let f = fixture();
        fs::write(f.out.join("Movie_chapters.cue.tmp.xml"), b"old").unwrap();

        let builder = ExtractionParameters::builder(&f.source, &f.out)
            .segment(Segment::Chapter(ChapterSegment { entry_count: 2 }))
            .mode(ExtractionMode::Chapters)
            .chapter_format(ChapterFormat::Cue);
        match plan(&builder.clone().build().unwrap()).unwrap_err() {
            ExtractionError::DestinationExists { path } => {
                assert_eq!(path, f.out.join("Movie_chapters.cue.tmp.xml"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(plan(&builder.overwrite_existing(true).build().unwrap()).is_ok());
    }

    #[test]
    fn outputs_differing_in_case_collide() {
        let f = fixture();
        let mut patterns = crate::patterns::FilenamePatterns::default();
        patterns.audio = "{FilenameNoExt}_{Language}".into();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(vec![
                Segment::Track(TrackSegment::new(1, TrackType::Audio, "A_AAC").with_language("ENG")),
                Segment::Track(TrackSegment::new(2, TrackType::Audio, "A_AAC").with_language("eng")),
            ])
            .patterns(patterns)
            .overwrite_existing(true)
            .build()
            .unwrap();
        assert!(matches!(
            plan(&params).unwrap_err(),
            ExtractionError::DuplicateOutput { .. }
        ));
    }

    #[test]
    fn missing_directory_and_source_are_reported() {
        let f = fixture();
        let params = ExtractionParameters::builder(&f.source, f.dir.path().join("gone"))
            .segments(segments())
            .build()
            .unwrap();
        assert!(matches!(
            plan(&params).unwrap_err(),
            ExtractionError::OutputDirectoryMissing { .. }
        ));

        let params = ExtractionParameters::builder(f.dir.path().join("nope.mkv"), &f.out)
            .segments(segments())
            .build()
            .unwrap();
        assert!(matches!(plan(&params).unwrap_err(), ExtractionError::SourceMissing { .. }));
    }

    #[test]
    fn escaping_names_are_rejected() {
        let f = fixture();
        let mut patterns = crate::patterns::FilenamePatterns::default();
        patterns.video = "../{FilenameNoExt}".into();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(segments())
            .patterns(patterns)
            .build()
            .unwrap();
        assert!(matches!(
            plan(&params).unwrap_err(),
            ExtractionError::InvalidOutputName { .. }
        ));
    }

    #[test]
    fn colliding_names_are_rejected() {
        let f = fixture();
        let mut patterns = crate::patterns::FilenamePatterns::default();
        patterns.audio = "same".into();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments([
                Segment::Track(TrackSegment::new(1, TrackType::Audio, "A_AAC")),
                Segment::Track(TrackSegment::new(2, TrackType::Audio, "A_AAC")),
            ])
            .patterns(patterns)
            .build()
            .unwrap();
        assert!(matches!(plan(&params).unwrap_err(), ExtractionError::DuplicateOutput { .. }));
    }

    #[test]
    fn mode_without_matching_segments_is_rejected() {
        let f = fixture();
        let params = ExtractionParameters::builder(&f.source, &f.out)
            .segments(segments())
            .mode(ExtractionMode::Attachments)
            .build()
            .unwrap();
        assert!(matches!(
            plan(&params).unwrap_err(),
            ExtractionError::NothingToExtract { mode: ExtractionMode::Attachments }
        ));
    }

    #[test]
    fn validate_name_rules() {
        assert!(validate_name("a/b").is_ok());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/../b").is_err());
        assert!(validate_name("/abs").is_err());
        assert!(validate_name("  ").is_err());
    }
}
