use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use quantmosaic_core::kernel::{DistanceWeighting, KernelConfig};
use quantmosaic_core::pipeline::config::{
    ChunkingConfig, FeatherConfig, MosaicConfig, StagingMode,
};
use quantmosaic_core::pipeline::{run_mosaic_reported, MosaicOutcome, MosaicStage, ProgressReporter};
use quantmosaic_core::stack::collapse::CollapseParams;
use tracing::info;

use crate::summary::{print_mosaic_result, print_mosaic_summary};

#[derive(Clone, ValueEnum)]
pub enum StagingArg {
    Disk,
    Memory,
}

#[derive(Clone, ValueEnum)]
pub enum WeightingArg {
    Uniform,
    Linear,
    Gaussian,
}

#[derive(Args)]
pub struct MosaicArgs {
    /// Input rasters, one per acquisition
    pub inputs: Vec<PathBuf>,

    /// Mosaic config file (TOML); replaces the other options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Raster whose grid and projection the mosaic takes
    #[arg(short, long, required_unless_present = "config")]
    pub reference: Option<PathBuf>,

    /// Output GeoTIFF
    #[arg(short, long, default_value = "mosaic.tif")]
    pub output: PathBuf,

    /// Target quantile (0-1)
    #[arg(short, long, default_value = "0.5")]
    pub quantile: f64,

    /// Plain median of the surviving samples instead of the weighted quantile
    #[arg(long)]
    pub unweighted: bool,

    /// Nodata sentinel of the output
    #[arg(long, default_value = "-9999.0", allow_hyphen_values = true)]
    pub nodata: f32,

    /// Number of row chunks
    #[arg(short, long, default_value = "1")]
    pub chunks: usize,

    /// Where staged layers and chunk results are kept
    #[arg(long, value_enum, default_value = "disk")]
    pub staging: StagingArg,

    /// Parent directory for staging files
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    /// Memory budget for one chunk in MiB; raises the chunk count as needed
    #[arg(long)]
    pub memory_budget: Option<usize>,

    /// Disable border feathering
    #[arg(long)]
    pub no_feather: bool,

    /// Feather distance in ground units
    #[arg(long, default_value = "5000")]
    pub feather_distance: f64,

    /// Kernel distance weighting
    #[arg(long, value_enum, default_value = "uniform")]
    pub weighting: WeightingArg,

    /// Sigma in cells for gaussian weighting
    #[arg(long, default_value = "1.0")]
    pub sigma: f64,

    /// Keep the input order instead of ordering by acquisition time
    #[arg(long)]
    pub keep_order: bool,

    /// Skip the run when the output already exists
    #[arg(long)]
    pub skip_completed: bool,
}

pub fn run(args: &MosaicArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid mosaic config")?
    } else {
        build_config_from_args(args)?
    };

    info!(
        inputs = config.inputs.len(),
        staging = %config.chunking.staging,
        "Mosaic config loaded"
    );
    print_mosaic_summary(&config);

    let reporter = Arc::new(BarReporter::new());
    let outcome = run_mosaic_reported(&config, reporter.clone())
        .with_context(|| format!("Mosaic of {} inputs failed", config.inputs.len()))?;
    reporter.bar.finish_and_clear();

    match outcome {
        MosaicOutcome::Completed(summary) => print_mosaic_result(&summary),
        MosaicOutcome::Skipped(path) => {
            println!("  {} exists, skipped", path.display());
        }
    }
    Ok(())
}

fn build_config_from_args(args: &MosaicArgs) -> Result<MosaicConfig> {
    let Some(reference) = args.reference.clone() else {
        bail!("--reference is required without --config");
    };
    let weighting = match args.weighting {
        WeightingArg::Uniform => DistanceWeighting::Uniform,
        WeightingArg::Linear => DistanceWeighting::Linear,
        WeightingArg::Gaussian => DistanceWeighting::Gaussian { sigma: args.sigma },
    };
    let staging = match args.staging {
        StagingArg::Disk => StagingMode::Disk,
        StagingArg::Memory => StagingMode::Memory,
    };

    Ok(MosaicConfig {
        inputs: args.inputs.clone(),
        reference,
        output: args.output.clone(),
        order_by_time: !args.keep_order,
        skip_completed: args.skip_completed,
        collapse: CollapseParams {
            quantile: args.quantile,
            weighted: !args.unweighted,
            nodata: args.nodata,
        },
        kernel: KernelConfig {
            weighting,
            ..Default::default()
        },
        chunking: ChunkingConfig {
            chunks: args.chunks,
            staging,
            tmp_dir: args.tmp_dir.clone(),
            memory_budget_mb: args.memory_budget,
        },
        feather: FeatherConfig {
            enabled: !args.no_feather,
            distance: args.feather_distance,
        },
    })
}

/// Drives a single progress bar through the run's stages.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template("{msg:30} [{bar:40}] {pos}/{len}") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: MosaicStage, total_items: Option<usize>) {
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }
}
