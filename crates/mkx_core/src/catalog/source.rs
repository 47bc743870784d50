//! Catalog trait and the in-memory catalog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::models::Segment;

/// Errors raised while listing a container's segments.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read container '{}': {reason}", path.display())]
    UnreadableContainer { path: PathBuf, reason: String },
}

impl CatalogError {
    pub fn unreadable(path: &Path, reason: impl Into<String>) -> Self {
        CatalogError::UnreadableContainer {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Lists the segments of a container file.
///
/// Implementations return `Info` first, followed by tracks, attachments
/// and chapters in container order. Segment identities must be stable for
/// the lifetime of one session.
pub trait Catalog: Send + Sync {
    fn discover(&self, path: &Path) -> CatalogResult<Vec<Segment>>;
}

/// Catalog backed by an in-memory map.
///
/// Lookups compare paths case-insensitively.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    files: Mutex<HashMap<String, Vec<Segment>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the segments of a file.
    pub fn insert(&self, path: impl AsRef<Path>, segments: Vec<Segment>) {
        self.files.lock().insert(key(path.as_ref()), segments);
    }

    /// Builder form of [`Self::insert`].
    pub fn with_file(self, path: impl AsRef<Path>, segments: Vec<Segment>) -> Self {
        self.insert(path, segments);
        self
    }

    /// Forget a file.
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.files.lock().remove(&key(path.as_ref()));
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

impl Catalog for StaticCatalog {
    fn discover(&self, path: &Path) -> CatalogResult<Vec<Segment>> {
        self.files
            .lock()
            .get(&key(path))
            .cloned()
            .ok_or_else(|| CatalogError::unreadable(path, "not in catalog"))
    }
}
