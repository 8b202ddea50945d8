use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2, Axis};
use tracing::{debug, info, warn};

use crate::consts::ALIGNMENT_TOLERANCE;
use crate::error::{MosaicError, Result};
use crate::io::geotiff::{read_grid, read_raster, write_raster};
use crate::kernel::KernelTable;
use crate::mosaic::{
    collapse_chunked_with_progress, resolve_chunk_count, ChunkSink, DiskStaging, MappedStack,
    MappedStackBuilder, MemoryStaging, StackSource, StagingArea,
};
use crate::prep::{feather_layers, feather_weights, place_on_grid, PixelSpacing};
use crate::raster::{GridSpec, Mosaic, RasterStack};
use crate::temporal::order_by_acquisition;

use super::config::{MosaicConfig, StagingMode};
use super::types::{MosaicOutcome, MosaicStage, MosaicSummary, NoOpReporter, ProgressReporter};

/// Run a full mosaic: order, align, feather, collapse and write.
pub fn run_mosaic(config: &MosaicConfig) -> Result<MosaicOutcome> {
    run_mosaic_reported(config, Arc::new(NoOpReporter))
}

/// Run a full mosaic with a thread-safe progress reporter.
pub fn run_mosaic_reported(
    config: &MosaicConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<MosaicOutcome> {
    validate(config)?;

    if config.skip_completed && config.output.exists() {
        info!(output = %config.output.display(), "Output exists, skipping");
        return Ok(MosaicOutcome::Skipped(config.output.clone()));
    }

    let (reference, _) = read_grid(&config.reference)?;
    info!(
        width = reference.width,
        height = reference.height,
        inputs = config.inputs.len(),
        "Reference grid loaded"
    );

    let (viable, skipped) = split_intersecting(&config.inputs, &reference)?;
    if viable.len() < 2 {
        return Err(MosaicError::TooFewTiles {
            viable: viable.len(),
            total: config.inputs.len(),
        });
    }

    let stacked = if config.order_by_time {
        reporter.begin_stage(MosaicStage::Ordering, Some(viable.len()));
        let ordered = order_by_acquisition(&viable)?;
        reporter.finish_stage();
        ordered
    } else {
        viable
    };

    let tile_count = stacked.len();
    let (mosaic, chunks, kernel_len) = match config.chunking.staging {
        StagingMode::Memory => {
            let stack = build_memory_stack(&stacked, &reference, config, &reporter)?;
            let mut sink = MemoryStaging::new();
            collapse_source(&stack, config, &mut sink, &reporter)?
        }
        StagingMode::Disk => {
            let area = StagingArea::new(config.chunking.tmp_dir.as_deref())?;
            let result = {
                let stack = build_mapped_stack(&area, &stacked, &reference, config, &reporter)?;
                let mut sink = DiskStaging::new(&area);
                collapse_source(&stack, config, &mut sink, &reporter)?
            };
            area.release()?;
            result
        }
    };

    reporter.begin_stage(MosaicStage::Writing, None);
    write_output(&config.output, mosaic.data.view(), &reference, mosaic.nodata)?;
    reporter.finish_stage();

    info!(
        output = %config.output.display(),
        valid = mosaic.valid_count(),
        "Mosaic written"
    );
    Ok(MosaicOutcome::Completed(MosaicSummary {
        output: config.output.clone(),
        mosaic,
        stacked,
        skipped,
        depth: tile_count,
        chunks,
        kernel_len,
    }))
}

fn validate(config: &MosaicConfig) -> Result<()> {
    if config.inputs.len() < 2 {
        return Err(MosaicError::TooFewInputs(config.inputs.len()));
    }
    config.collapse.validate()?;
    if config.chunking.chunks == 0 {
        return Err(MosaicError::InvalidChunkCount(0));
    }
    let distance = config.feather.distance;
    if config.feather.enabled && !(distance.is_finite() && distance > 0.0) {
        return Err(MosaicError::InvalidFeather(distance));
    }
    Ok(())
}

/// Split inputs into tiles overlapping the reference and tiles to skip.
fn split_intersecting(
    inputs: &[PathBuf],
    reference: &GridSpec,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut viable = Vec::with_capacity(inputs.len());
    let mut skipped = Vec::new();
    for path in inputs {
        let (grid, _) = read_grid(path)?;
        if grid.intersects(reference) {
            viable.push(path.clone());
        } else {
            warn!("{} does not intersect the reference grid, skipping", path.display());
            skipped.push(path.clone());
        }
    }
    Ok((viable, skipped))
}

/// Read a tile and place it on the reference grid with the run's sentinel.
fn load_layer(path: &Path, reference: &GridSpec, nodata: f32) -> Result<Array2<f32>> {
    let tile = read_raster(path)?;
    place_on_grid(&tile, reference, nodata, ALIGNMENT_TOLERANCE)?.ok_or_else(|| {
        MosaicError::Alignment(format!(
            "{} has no pixels on the reference grid",
            path.display()
        ))
    })
}

fn spacing_of(reference: &GridSpec) -> PixelSpacing {
    PixelSpacing {
        x: reference.pixel_width(),
        y: reference.pixel_height(),
    }
}

fn build_memory_stack(
    paths: &[PathBuf],
    reference: &GridSpec,
    config: &MosaicConfig,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<RasterStack> {
    let nodata = config.collapse.nodata;

    reporter.begin_stage(MosaicStage::Reading, Some(paths.len()));
    let mut layers = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        layers.push(load_layer(path, reference, nodata)?);
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    let views: Vec<ArrayView2<f32>> = layers.iter().map(|l| l.view()).collect();
    let stack = RasterStack::from_layers(&views, nodata)?;
    if !config.feather.enabled {
        return Ok(stack);
    }

    reporter.begin_stage(MosaicStage::Feathering, Some(paths.len()));
    let weights = feather_layers(&views, nodata, spacing_of(reference), config.feather.distance)?;
    reporter.advance(paths.len());
    reporter.finish_stage();

    let weight_views: Vec<ArrayView2<f32>> = weights.iter().map(|w| w.view()).collect();
    let feather: Array3<f32> = ndarray::stack(Axis(2), &weight_views)?;
    stack.with_feather(feather)
}

fn build_mapped_stack(
    area: &StagingArea,
    paths: &[PathBuf],
    reference: &GridSpec,
    config: &MosaicConfig,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<MappedStack> {
    let nodata = config.collapse.nodata;
    let spacing = spacing_of(reference);

    reporter.begin_stage(MosaicStage::Reading, Some(paths.len()));
    let mut builder = MappedStackBuilder::new(area);
    for (i, path) in paths.iter().enumerate() {
        let layer = load_layer(path, reference, nodata)?;
        let feather = if config.feather.enabled {
            Some(feather_weights(
                layer.view(),
                nodata,
                spacing,
                config.feather.distance,
            )?)
        } else {
            None
        };
        builder.push(layer.view(), feather.as_ref().map(|f| f.view()))?;
        reporter.advance(i + 1);
    }
    reporter.finish_stage();
    debug!(layers = builder.len(), "All layers staged");
    builder.finish(nodata)
}

/// Build the kernel for the stack's depth and drive the chunked collapse.
fn collapse_source<S: StackSource>(
    source: &S,
    config: &MosaicConfig,
    sink: &mut dyn ChunkSink,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<(Mosaic, usize, usize)> {
    let (rows, cols, depth) = source.dim();
    let kernel = KernelTable::build(depth, &config.kernel)?;
    info!(
        depth,
        offsets = kernel.len(),
        weighting = %config.kernel.weighting,
        "Kernel built"
    );

    let planes = if source.has_feather() { 2 } else { 1 };
    let bytes_per_row = cols * depth * planes * std::mem::size_of::<f32>();
    let chunks = resolve_chunk_count(
        rows,
        bytes_per_row,
        kernel.row_radius(),
        config.chunking.chunks,
        config.chunking.memory_budget_bytes(),
    );

    reporter.begin_stage(MosaicStage::Collapsing, Some(chunks.min(rows)));
    let mosaic = collapse_chunked_with_progress(
        source,
        &kernel,
        &config.collapse,
        chunks,
        sink,
        |done| reporter.advance(done),
    )?;
    reporter.finish_stage();
    Ok((mosaic, chunks.min(rows), kernel.len()))
}

/// Write next to the destination first so a failed encode leaves no output behind.
fn write_output(path: &Path, data: ArrayView2<f32>, grid: &GridSpec, nodata: f32) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    if let Err(e) = write_raster(&partial, data, grid, Some(nodata)) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    fs::rename(&partial, path)?;
    Ok(())
}
