//! Extraction engine.
//!
//! An [`ExtractionParameters`](crate::params::ExtractionParameters) request
//! is first planned (outputs resolved, pre-flight checks run) and then
//! executed by [`ExtractionEngine`], one mkvextract invocation per unit.

mod engine;
mod mkvextract;
mod plan;
mod types;

pub use engine::{strip_utf8_bom, ExtractionEngine};
pub use mkvextract::{
    build_args, classify_line, display_command, extension_for_codec, ToolLine, ToolMode,
};
pub use plan::{plan, ExtractionPlan, PlannedUnit, PostStep, UnitTarget};
pub use types::{
    EngineConfig, ExtractionError, ExtractionEvent, ExtractionOutcome, ExtractionResult,
};
