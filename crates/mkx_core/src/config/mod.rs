//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Resolution of the MKVToolNix executables
//!
//! # Example
//!
//! ```no_run
//! use mkx_core::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! // Modify a setting
//! config.settings_mut().extraction.overwrite_existing = true;
//!
//! // Save just the extraction section atomically
//! config.update_section(ConfigSection::Extraction).unwrap();
//! ```

mod manager;
mod settings;
mod tools;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, ExtractionSettings, LoggingSettings, PathSettings, Settings, ToolSettings,
};
pub use tools::ToolPaths;
