//! MKX Core - extraction job engine for Matroska files
//!
//! This crate contains all extraction logic with zero UI dependencies.
//! It turns a track selection into extraction requests, runs them through
//! mkvextract one job at a time and tracks job state in a queue. It can be
//! used by a GUI application or a CLI tool.

pub mod abort;
pub mod catalog;
pub mod chapters;
pub mod config;
pub mod extraction;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod params;
pub mod patterns;
pub mod selection;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
