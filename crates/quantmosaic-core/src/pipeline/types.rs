use std::path::PathBuf;

use crate::raster::Mosaic;

/// Mosaic run stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MosaicStage {
    Ordering,
    Reading,
    Feathering,
    Collapsing,
    Writing,
}

impl std::fmt::Display for MosaicStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ordering => write!(f, "Ordering by acquisition time"),
            Self::Reading => write!(f, "Reading and aligning tiles"),
            Self::Feathering => write!(f, "Feathering borders"),
            Self::Collapsing => write!(f, "Collapsing stack"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for a mosaic run.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (tiles or chunks), if known.
    fn begin_stage(&self, _stage: MosaicStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_mosaic` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// What a mosaic run did.
#[derive(Debug)]
pub enum MosaicOutcome {
    Completed(MosaicSummary),
    /// `skip_completed` was set and the output already existed.
    Skipped(PathBuf),
}

#[derive(Debug)]
pub struct MosaicSummary {
    pub output: PathBuf,
    pub mosaic: Mosaic,
    /// Inputs in stack order, after non-overlapping tiles were dropped.
    pub stacked: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub depth: usize,
    pub chunks: usize,
    pub kernel_len: usize,
}
