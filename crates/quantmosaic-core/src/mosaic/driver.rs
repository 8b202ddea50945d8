use ndarray::s;
use tracing::{debug, info};

use crate::error::{MosaicError, Result};
use crate::kernel::KernelTable;
use crate::raster::Mosaic;
use crate::stack::collapse::{collapse, CollapseParams};

use super::chunk::ChunkPlan;
use super::source::StackSource;
use super::staging::ChunkSink;

/// Collapse a stack, splitting the row axis into `chunks` halo-padded pieces.
///
/// The stack's own nodata sentinel overrides `params.nodata`.
pub fn collapse_chunked<S>(
    source: &S,
    kernel: &KernelTable,
    params: &CollapseParams,
    chunks: usize,
    sink: &mut dyn ChunkSink,
) -> Result<Mosaic>
where
    S: StackSource + ?Sized,
{
    collapse_chunked_with_progress(source, kernel, params, chunks, sink, |_| {})
}

/// Same as [`collapse_chunked`], calling `on_chunk(done)` after each chunk.
///
/// Chunks run strictly in order; chunk `i + 1` is read only after chunk `i`
/// has been handed to the sink. Halo rows equal the kernel's row radius, so
/// results are identical for every chunk count.
pub fn collapse_chunked_with_progress<S, F>(
    source: &S,
    kernel: &KernelTable,
    params: &CollapseParams,
    chunks: usize,
    sink: &mut dyn ChunkSink,
    mut on_chunk: F,
) -> Result<Mosaic>
where
    S: StackSource + ?Sized,
    F: FnMut(usize),
{
    if chunks == 0 {
        return Err(MosaicError::InvalidChunkCount(chunks));
    }
    let params = CollapseParams {
        nodata: source.nodata(),
        ..params.clone()
    };
    params.validate()?;
    let (rows, cols, _) = source.dim();

    if chunks == 1 {
        let chunk = source.read_rows(0..rows)?;
        let data = collapse(
            chunk.values.view(),
            chunk.feather.as_ref().map(|f| f.view()),
            kernel,
            &params,
        )?;
        on_chunk(1);
        let mut mosaic = Mosaic {
            data,
            nodata: params.nodata,
        };
        mosaic.apply_mask();
        return Ok(mosaic);
    }

    let plan = ChunkPlan::new(rows, chunks, kernel.row_radius())?;
    info!(
        chunks = plan.chunk_count,
        rows,
        halo = plan.halo(),
        "Collapsing in chunks"
    );

    for bounds in plan.iter() {
        debug!(
            chunk = bounds.index + 1,
            of = plan.chunk_count,
            read = ?bounds.read_rows(),
            output = ?bounds.output_rows(),
            "Collapsing chunk"
        );
        let collapsed = {
            let chunk = source.read_rows(bounds.read_rows())?;
            collapse(
                chunk.values.view(),
                chunk.feather.as_ref().map(|f| f.view()),
                kernel,
                &params,
            )?
        };

        if collapsed.nrows() != bounds.read_height() {
            return Err(MosaicError::Staging(format!(
                "chunk {} returned {} rows, expected {}",
                bounds.index,
                collapsed.nrows(),
                bounds.read_height()
            )));
        }
        let keep = bounds.pad_top..bounds.pad_top + bounds.output_height();
        let trimmed = collapsed.slice(s![keep, ..]).to_owned();
        drop(collapsed);

        sink.stage(&bounds, trimmed)?;
        on_chunk(bounds.index + 1);
    }

    debug!("Merging chunks");
    let data = sink.assemble(rows, cols)?;
    let mut mosaic = Mosaic {
        data,
        nodata: params.nodata,
    };
    mosaic.apply_mask();
    Ok(mosaic)
}
