use std::ops::Range;

use tracing::{debug, warn};

use crate::error::{MosaicError, Result};

/// Row window of one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkBounds {
    pub index: usize,

    // Output rows (what ends up in the mosaic)
    pub output_start: usize,
    pub output_end: usize,

    // Read rows (output rows plus halo)
    pub read_start: usize,
    pub read_end: usize,

    // Halo rows actually added (less than the radius only at the raster edge)
    pub pad_top: usize,
    pub pad_bottom: usize,
}

impl ChunkBounds {
    pub fn output_rows(&self) -> Range<usize> {
        self.output_start..self.output_end
    }

    pub fn read_rows(&self) -> Range<usize> {
        self.read_start..self.read_end
    }

    pub fn output_height(&self) -> usize {
        self.output_end - self.output_start
    }

    pub fn read_height(&self) -> usize {
        self.read_end - self.read_start
    }
}

/// Partition of the row axis into `chunk_count` nearly equal halo-padded ranges.
#[derive(Clone, Debug)]
pub struct ChunkPlan {
    rows: usize,
    halo: usize,
    pub chunk_count: usize,
}

impl ChunkPlan {
    pub fn new(rows: usize, requested: usize, halo: usize) -> Result<Self> {
        if requested == 0 {
            return Err(MosaicError::InvalidChunkCount(requested));
        }
        if rows == 0 {
            return Err(MosaicError::EmptyStack);
        }
        let chunk_count = if requested > rows {
            warn!(
                requested,
                rows, "More chunks than rows requested, using one chunk per row"
            );
            rows
        } else {
            requested
        };

        debug!(rows, chunk_count, halo, "ChunkPlan");
        Ok(Self {
            rows,
            halo,
            chunk_count,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn halo(&self) -> usize {
        self.halo
    }

    pub fn bounds(&self, index: usize) -> ChunkBounds {
        let output_start = index * self.rows / self.chunk_count;
        let output_end = (index + 1) * self.rows / self.chunk_count;

        let read_start = output_start.saturating_sub(self.halo);
        let read_end = (output_end + self.halo).min(self.rows);

        ChunkBounds {
            index,
            output_start,
            output_end,
            read_start,
            read_end,
            pad_top: output_start - read_start,
            pad_bottom: read_end - output_end,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkBounds> + '_ {
        (0..self.chunk_count).map(|i| self.bounds(i))
    }
}

/// Smallest chunk count whose padded chunk footprint fits `budget_bytes`,
/// never below `requested`.
///
/// `bytes_per_row` is the stack footprint of one row across all layers
/// (values plus feather weights when present).
pub fn resolve_chunk_count(
    rows: usize,
    bytes_per_row: usize,
    halo: usize,
    requested: usize,
    budget_bytes: Option<usize>,
) -> usize {
    let Some(budget) = budget_bytes else {
        return requested;
    };
    let max_rows = budget / bytes_per_row.max(1);
    // Each padded chunk carries up to 2 * halo extra rows.
    let usable = max_rows.saturating_sub(2 * halo).max(1);
    let needed = rows.div_ceil(usable);
    let resolved = requested.max(needed).min(rows.max(1));
    if resolved != requested {
        debug!(requested, resolved, budget, "Chunk count raised to fit memory budget");
    }
    resolved
}
