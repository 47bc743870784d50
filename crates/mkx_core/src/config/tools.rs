//! Locating the MKVToolNix executables.

use std::env;
use std::path::{Path, PathBuf};

use super::settings::ToolSettings;

/// Resolved executable paths for the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub mkvextract: PathBuf,
    pub mkvmerge: PathBuf,
}

impl Default for ToolPaths {
    /// Bare names, resolved through PATH when spawned.
    fn default() -> Self {
        Self {
            mkvextract: PathBuf::from(exe_name("mkvextract")),
            mkvmerge: PathBuf::from(exe_name("mkvmerge")),
        }
    }
}

impl ToolPaths {
    /// Executables inside an MKVToolNix directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            mkvextract: dir.join(exe_name("mkvextract")),
            mkvmerge: dir.join(exe_name("mkvmerge")),
        }
    }

    /// Resolve from settings. An empty `mkvtoolnix_path` means PATH lookup.
    pub fn from_settings(tool: &ToolSettings) -> Self {
        let dir = tool.mkvtoolnix_path.trim();
        if dir.is_empty() {
            Self::default()
        } else {
            Self::in_dir(dir)
        }
    }

    /// Find the MKVToolNix directory by scanning PATH for mkvmerge.
    pub fn autodetect() -> Option<PathBuf> {
        let path_var = env::var_os("PATH")?;
        find_in_dirs(env::split_paths(&path_var))
    }

    /// Resolve from settings, falling back to a PATH scan when no directory
    /// is configured. Bare names are used if the scan finds nothing.
    pub fn locate(tool: &ToolSettings) -> Self {
        if !tool.mkvtoolnix_path.trim().is_empty() {
            return Self::from_settings(tool);
        }
        match Self::autodetect() {
            Some(dir) => {
                tracing::debug!("Found MKVToolNix in {}", dir.display());
                Self::in_dir(dir)
            }
            None => {
                tracing::warn!("mkvmerge not found on PATH; set tool.mkvtoolnix_path");
                Self::default()
            }
        }
    }
}

/// First directory containing a mkvmerge executable.
fn find_in_dirs(dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    dirs.into_iter()
        .find(|dir| dir.join(exe_name("mkvmerge")).is_file())
}

fn exe_name(tool: &str) -> String {
    format!("{}{}", tool, env::consts::EXE_SUFFIX)
}
