use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_FEATHER_DISTANCE;
use crate::kernel::KernelConfig;
use crate::stack::collapse::CollapseParams;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MosaicConfig {
    /// Per-date input rasters, already in the reference projection.
    pub inputs: Vec<PathBuf>,
    /// Raster whose grid (size, geotransform, projection) the mosaic takes.
    pub reference: PathBuf,
    pub output: PathBuf,
    /// Arrange the stack by acquisition time (parsed from the file names).
    #[serde(default = "default_true")]
    pub order_by_time: bool,
    /// Return without doing anything when the output already exists.
    #[serde(default)]
    pub skip_completed: bool,
    #[serde(default)]
    pub collapse: CollapseParams,
    #[serde(default)]
    pub kernel: KernelConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub feather: FeatherConfig,
}

impl MosaicConfig {
    pub fn new(inputs: Vec<PathBuf>, reference: PathBuf, output: PathBuf) -> Self {
        Self {
            inputs,
            reference,
            output,
            order_by_time: true,
            skip_completed: false,
            collapse: CollapseParams::default(),
            kernel: KernelConfig::default(),
            chunking: ChunkingConfig::default(),
            feather: FeatherConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Row chunks to split the stack into (at least 1).
    pub chunks: usize,
    pub staging: StagingMode,
    /// Parent directory for the per-run staging area (system temp dir if unset).
    pub tmp_dir: Option<PathBuf>,
    /// Upper bound for one padded chunk of the stack; raises `chunks` if needed.
    pub memory_budget_mb: Option<usize>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunks: 1,
            staging: StagingMode::Disk,
            tmp_dir: None,
            memory_budget_mb: None,
        }
    }
}

impl ChunkingConfig {
    pub fn memory_budget_bytes(&self) -> Option<usize> {
        self.memory_budget_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }
}

/// Where aligned layers and chunk results live between steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StagingMode {
    /// Memory-mapped files in a per-run temp directory.
    #[default]
    Disk,
    /// Everything stays resident.
    Memory,
}

impl std::fmt::Display for StagingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disk => write!(f, "Disk"),
            Self::Memory => write!(f, "Memory"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatherConfig {
    pub enabled: bool,
    /// Distance from a tile border, in ground units, at which weights reach 1.
    pub distance: f64,
}

impl Default for FeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            distance: DEFAULT_FEATHER_DISTANCE,
        }
    }
}
