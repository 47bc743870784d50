//! Loaded files and their checked segments.

use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogResult};
use crate::models::{Segment, SegmentId, SegmentInfo};
use crate::params::{ExtractionOptions, ExtractionParameters, ParameterResult};

use super::types::{CheckState, OutputLocation, SegmentKind};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    segment: Segment,
    kind: SegmentKind,
    checked: bool,
}

/// One loaded container.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    path: PathBuf,
    info: Option<SegmentInfo>,
    entries: Vec<Entry>,
}

impl LoadedFile {
    fn new(path: PathBuf, segments: Vec<Segment>) -> Self {
        let mut info = None;
        let mut entries = Vec::with_capacity(segments.len());
        for segment in segments {
            match SegmentKind::of(&segment) {
                Some(kind) => entries.push(Entry {
                    segment,
                    kind,
                    checked: false,
                }),
                None => {
                    if let Segment::Info(i) = segment {
                        info = Some(i);
                    }
                }
            }
        }
        Self {
            path,
            info,
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> Option<&SegmentInfo> {
        self.info.as_ref()
    }

    /// Extractable segments in catalog order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().map(|e| &e.segment)
    }

    /// Checked segments in catalog order.
    pub fn checked(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().filter(|e| e.checked).map(|e| &e.segment)
    }

    pub fn is_checked(&self, id: SegmentId) -> bool {
        self.entries
            .iter()
            .any(|e| e.checked && e.segment.id() == id)
    }

    pub fn state(&self) -> CheckState {
        CheckState::fold(self.entries.iter().map(|e| e.checked))
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// Files loaded for extraction and the segments checked in each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    files: Vec<LoadedFile>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with its catalog listing. Nothing is checked.
    ///
    /// Returns `false` when the path (compared case-insensitively) is
    /// already loaded.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, segments: Vec<Segment>) -> bool {
        let path = path.into();
        if self.files.iter().any(|f| same_path(&f.path, &path)) {
            return false;
        }
        tracing::debug!("Loaded {} ({} segments)", path.display(), segments.len());
        self.files.push(LoadedFile::new(path, segments));
        true
    }

    /// Discover a file through `catalog` and add it.
    pub fn load(&mut self, path: &Path, catalog: &dyn Catalog) -> CatalogResult<bool> {
        if self.contains(path) {
            return Ok(false);
        }
        let segments = catalog.discover(path)?;
        Ok(self.add_file(path, segments))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| same_path(&f.path, path))
    }

    pub fn remove_file(&mut self, path: &Path) -> bool {
        let before = self.files.len();
        self.files.retain(|f| !same_path(&f.path, path));
        self.files.len() != before
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[LoadedFile] {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&LoadedFile> {
        self.files.iter().find(|f| same_path(&f.path, path))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check or uncheck one segment. Returns whether it was found.
    pub fn set_checked(&mut self, path: &Path, id: SegmentId, checked: bool) -> bool {
        let entry = self
            .files
            .iter_mut()
            .find(|f| same_path(&f.path, path))
            .and_then(|f| f.entries.iter_mut().find(|e| e.segment.id() == id));
        match entry {
            Some(entry) => {
                entry.checked = checked;
                true
            }
            None => false,
        }
    }

    /// Check or uncheck every segment of one file.
    pub fn set_file_checked(&mut self, path: &Path, checked: bool) {
        if let Some(file) = self.files.iter_mut().find(|f| same_path(&f.path, path)) {
            file.entries.iter_mut().for_each(|e| e.checked = checked);
        }
    }

    fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.files.iter_mut().flat_map(|f| f.entries.iter_mut())
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.files.iter().flat_map(|f| f.entries.iter())
    }

    pub fn select_all(&mut self) {
        self.entries_mut().for_each(|e| e.checked = true);
    }

    pub fn deselect_all(&mut self) {
        self.entries_mut().for_each(|e| e.checked = false);
    }

    pub fn invert(&mut self) {
        self.entries_mut().for_each(|e| e.checked = !e.checked);
    }

    /// Check or uncheck every segment of a kind across all files.
    pub fn select_kind(&mut self, kind: SegmentKind, checked: bool) {
        self.entries_mut()
            .filter(|e| e.kind == kind)
            .for_each(|e| e.checked = checked);
    }

    /// State of one file. Unknown files are `None`.
    pub fn file_state(&self, path: &Path) -> CheckState {
        self.file(path).map_or(CheckState::None, LoadedFile::state)
    }

    pub fn kind_state(&self, kind: SegmentKind) -> CheckState {
        CheckState::fold(self.entries().filter(|e| e.kind == kind).map(|e| e.checked))
    }

    pub fn overall_state(&self) -> CheckState {
        CheckState::fold(self.entries().map(|e| e.checked))
    }

    /// Number of checked segments across all files.
    pub fn checked_count(&self) -> usize {
        self.entries().filter(|e| e.checked).count()
    }

    /// One request per file with at least one checked segment, in load
    /// order.
    pub fn build_parameters(
        &self,
        options: &ExtractionOptions,
        location: &OutputLocation,
    ) -> ParameterResult<Vec<ExtractionParameters>> {
        self.files
            .iter()
            .filter(|f| f.entries.iter().any(|e| e.checked))
            .map(|f| {
                ExtractionParameters::builder(&f.path, location.resolve(&f.path))
                    .segments(f.checked().cloned())
                    .options(options)
                    .build()
            })
            .collect()
    }
}
