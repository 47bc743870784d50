//! Extraction request parameters.
//!
//! An [`ExtractionParameters`] value describes one unit of work: a source
//! file, the selected segments and the output rules. Values are immutable
//! once built and compare structurally, which the job queue relies on to
//! drop duplicate submissions.

mod options;
mod parameters;

pub use options::ExtractionOptions;
pub(crate) use parameters::path_key;
pub use parameters::{ExtractionParameters, ParameterError, ParameterResult, ParametersBuilder};
