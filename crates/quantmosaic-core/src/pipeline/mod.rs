pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{run_mosaic, run_mosaic_reported};
pub use types::{MosaicOutcome, MosaicStage, MosaicSummary, ProgressReporter};
