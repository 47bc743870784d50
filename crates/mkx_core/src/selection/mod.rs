//! Track selection across loaded files.
//!
//! Files are loaded with their catalog listing; segments are checked one by
//! one or in bulk, and the checked segments of every file become one
//! extraction request each.

mod state;
mod types;

pub use state::{LoadedFile, Selection};
pub use types::{CheckState, OutputLocation, SegmentKind};
