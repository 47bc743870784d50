//! The extraction request value object.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{
    ChapterFormat, CuesExtractionMode, ExtractionMode, Segment, SegmentId, TimecodesExtractionMode,
};
use crate::patterns::FilenamePatterns;

use super::options::ExtractionOptions;

/// Errors raised while building parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("No extractable segment selected for '{}'", source_file.display())]
    EmptySelection { source_file: PathBuf },
}

/// Result type for parameter building.
pub type ParameterResult<T> = Result<T, ParameterError>;

/// One extraction request: a source file, the segments to pull out of it
/// and the output rules.
///
/// Equality compares paths case-insensitively and segment sets by sorted
/// identity, so two requests built from the same selection in a different
/// order are equal.
#[derive(Debug, Clone)]
pub struct ExtractionParameters {
    source_file: PathBuf,
    segments: Vec<Segment>,
    pub output_directory: PathBuf,
    pub mode: ExtractionMode,
    pub chapter_format: ChapterFormat,
    pub timecodes_mode: TimecodesExtractionMode,
    pub cues_mode: CuesExtractionMode,
    pub filename_patterns: FilenamePatterns,
    pub disable_bom_for_text: bool,
    pub use_raw: bool,
    pub use_full_raw: bool,
    pub overwrite_existing: bool,
}

impl ExtractionParameters {
    /// Start building parameters for a source file.
    pub fn builder(source_file: impl Into<PathBuf>, output_directory: impl Into<PathBuf>) -> ParametersBuilder {
        ParametersBuilder::new(source_file.into(), output_directory.into())
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Selected segments in selection order. Never empty.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Sorted identities of the selected segments.
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        let mut ids: Vec<SegmentId> = self.segments.iter().map(Segment::id).collect();
        ids.sort();
        ids
    }
}

/// Case-insensitive comparison key for a path.
pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

impl PartialEq for ExtractionParameters {
    fn eq(&self, other: &Self) -> bool {
        path_key(&self.source_file) == path_key(&other.source_file)
            && path_key(&self.output_directory) == path_key(&other.output_directory)
            && self.segment_ids() == other.segment_ids()
            && self.mode == other.mode
            && self.chapter_format == other.chapter_format
            && self.timecodes_mode == other.timecodes_mode
            && self.cues_mode == other.cues_mode
            && self.filename_patterns == other.filename_patterns
            && self.disable_bom_for_text == other.disable_bom_for_text
            && self.use_raw == other.use_raw
            && self.use_full_raw == other.use_full_raw
            && self.overwrite_existing == other.overwrite_existing
    }
}

impl Eq for ExtractionParameters {}

/// Builder for [`ExtractionParameters`].
#[derive(Debug, Clone)]
pub struct ParametersBuilder {
    source_file: PathBuf,
    output_directory: PathBuf,
    segments: Vec<Segment>,
    options: ExtractionOptions,
    timecodes_mode: Option<TimecodesExtractionMode>,
    cues_mode: Option<CuesExtractionMode>,
}

impl ParametersBuilder {
    fn new(source_file: PathBuf, output_directory: PathBuf) -> Self {
        Self {
            source_file,
            output_directory,
            segments: Vec::new(),
            options: ExtractionOptions::default(),
            timecodes_mode: None,
            cues_mode: None,
        }
    }

    /// Add one segment. Info segments and repeated identities are ignored.
    pub fn segment(mut self, segment: Segment) -> Self {
        self.push(segment);
        self
    }

    /// Add several segments.
    pub fn segments(mut self, segments: impl IntoIterator<Item = Segment>) -> Self {
        for segment in segments {
            self.push(segment);
        }
        self
    }

    fn push(&mut self, segment: Segment) {
        if !segment.is_extractable() {
            return;
        }
        let id = segment.id();
        if self.segments.iter().any(|s| s.id() == id) {
            return;
        }
        self.segments.push(segment);
    }

    /// Apply shared options.
    pub fn options(mut self, options: &ExtractionOptions) -> Self {
        self.options = options.clone();
        self
    }

    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn chapter_format(mut self, format: ChapterFormat) -> Self {
        self.options.chapter_format = format;
        self
    }

    pub fn patterns(mut self, patterns: FilenamePatterns) -> Self {
        self.options.filename_patterns = patterns;
        self
    }

    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.options.overwrite_existing = overwrite;
        self
    }

    pub fn disable_bom_for_text(mut self, disable: bool) -> Self {
        self.options.disable_bom_for_text = disable;
        self
    }

    pub fn raw(mut self, use_raw: bool, use_full_raw: bool) -> Self {
        self.options.use_raw = use_raw;
        self.options.use_full_raw = use_full_raw;
        self
    }

    /// Override the timecodes toggle implied by the mode.
    pub fn timecodes(mut self, mode: TimecodesExtractionMode) -> Self {
        self.timecodes_mode = Some(mode);
        self
    }

    /// Override the cues toggle implied by the mode.
    pub fn cues(mut self, mode: CuesExtractionMode) -> Self {
        self.cues_mode = Some(mode);
        self
    }

    /// Build, requiring at least one extractable segment.
    pub fn build(self) -> ParameterResult<ExtractionParameters> {
        if self.segments.is_empty() {
            return Err(ParameterError::EmptySelection {
                source_file: self.source_file,
            });
        }

        let opts = self.options;
        Ok(ExtractionParameters {
            source_file: self.source_file,
            segments: self.segments,
            output_directory: self.output_directory,
            mode: opts.mode,
            chapter_format: opts.chapter_format,
            timecodes_mode: self.timecodes_mode.unwrap_or_else(|| opts.mode.timecodes_mode()),
            cues_mode: self.cues_mode.unwrap_or_else(|| opts.mode.cues_mode()),
            filename_patterns: opts.filename_patterns,
            disable_bom_for_text: opts.disable_bom_for_text,
            use_raw: opts.use_raw,
            use_full_raw: opts.use_full_raw,
            overwrite_existing: opts.overwrite_existing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentSegment, SegmentInfo, TrackSegment, TrackType};

    fn video() -> Segment {
        Segment::Track(TrackSegment::new(0, TrackType::Video, "V_MPEG4/ISO/AVC"))
    }

    fn audio() -> Segment {
        Segment::Track(TrackSegment::new(1, TrackType::Audio, "A_AAC"))
    }

    fn font() -> Segment {
        Segment::Attachment(AttachmentSegment::new(1, "font.ttf", "font/ttf", 10))
    }

    #[test]
    fn equality_ignores_segment_order() {
        let p = ExtractionParameters::builder("/m/a.mkv", "/out")
            .segments([video(), audio(), font()])
            .build()
            .unwrap();
        let q = ExtractionParameters::builder("/m/a.mkv", "/out")
            .segments([font(), audio(), video()])
            .build()
            .unwrap();
        assert_eq!(p, q);
    }

    #[test]
    fn equality_ignores_path_case() {
        let p = ExtractionParameters::builder("/M/A.MKV", "/Out")
            .segment(video())
            .build()
            .unwrap();
        let q = ExtractionParameters::builder("/m/a.mkv", "/out")
            .segment(video())
            .build()
            .unwrap();
        assert_eq!(p, q);
    }

    #[test]
    fn equality_checks_scalars_and_segments() {
        let base = ExtractionParameters::builder("/m/a.mkv", "/out").segment(video());
        let p = base.clone().build().unwrap();

        assert_ne!(p, base.clone().overwrite_existing(true).build().unwrap());
        assert_ne!(p, base.clone().raw(true, false).build().unwrap());
        assert_ne!(p, base.clone().segment(audio()).build().unwrap());
        assert_ne!(p, base.mode(ExtractionMode::Cues).build().unwrap());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = ExtractionParameters::builder("/m/a.mkv", "/out")
            .segment(Segment::Info(SegmentInfo::default()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ParameterError::EmptySelection { .. }));
    }

    #[test]
    fn duplicate_segments_are_collapsed() {
        let p = ExtractionParameters::builder("/m/a.mkv", "/out")
            .segments([video(), video(), audio()])
            .build()
            .unwrap();
        assert_eq!(p.segments().len(), 2);
    }

    #[test]
    fn mode_implies_toggles_unless_overridden() {
        let p = ExtractionParameters::builder("/m/a.mkv", "/out")
            .segment(video())
            .mode(ExtractionMode::TimestampsV2)
            .build()
            .unwrap();
        assert_eq!(p.timecodes_mode, TimecodesExtractionMode::OnlyTimecodes);
        assert_eq!(p.cues_mode, CuesExtractionMode::NoCues);

        let p = ExtractionParameters::builder("/m/a.mkv", "/out")
            .segment(video())
            .cues(CuesExtractionMode::OnlyCues)
            .build()
            .unwrap();
        assert_eq!(p.mode, ExtractionMode::Tracks);
        assert_eq!(p.cues_mode, CuesExtractionMode::OnlyCues);
    }
}
