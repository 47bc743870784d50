//! Filename pattern engine.
//!
//! Output filenames are derived from user templates such as
//! `{FilenameNoExt}_track{TrackNumber:00}_{Language}`. See [`render`]
//! for the token syntax.

mod render;
mod types;

pub use render::{render, sanitize};
pub use types::{FileContext, FilenamePatterns};
