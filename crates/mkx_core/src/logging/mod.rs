//! Logging infrastructure.
//!
//! This module provides:
//! - The diagnostic log shared by the extraction engine and job queue
//! - Compact mode with progress filtering
//! - Tail buffer for error diagnosis
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use mkx_core::logging::{DiagnosticLog, LogConfig};
//!
//! let log = DiagnosticLog::create_in("/path/to/logs", "session", LogConfig::default(), None)
//!     .unwrap();
//!
//! log.phase("Extraction");
//! log.command("mkvextract movie.mkv tracks 0:movie.h264");
//! log.progress(50);
//! log.success("Job completed");
//! ```

mod diagnostic_log;
mod types;

pub use diagnostic_log::DiagnosticLog;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
