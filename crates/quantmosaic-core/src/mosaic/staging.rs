use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::{Array2, ArrayView2, Axis};
use tempfile::TempDir;
use tracing::debug;

use crate::consts::{STAGING_HEADER_SIZE, STAGING_MAGIC};
use crate::error::{MosaicError, Result};

use super::chunk::ChunkBounds;

const STAGING_PREFIX: &str = "quantmosaic-";

/// Per-run scratch directory for staged arrays.
///
/// Every file is keyed by the run token, so concurrent runs sharing a parent
/// directory never collide. The directory and everything in it is removed
/// on [`StagingArea::release`] or when the area is dropped.
pub struct StagingArea {
    dir: TempDir,
    token: String,
}

impl StagingArea {
    /// Create a staging area under `parent`, or the system temp dir.
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let token = dir
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(STAGING_PREFIX))
            .unwrap_or_default()
            .to_string();

        debug!(path = %dir.path().display(), token = %token, "Staging area created");
        Ok(Self { dir, token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// File path of the `index`-th artifact of a given kind for this run.
    pub fn key_path(&self, kind: &str, index: usize) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}_{}_{}.f32", self.token, kind, index))
    }

    /// Write a 2-D array and fsync it before returning.
    pub fn write_array(&self, kind: &str, index: usize, data: ArrayView2<f32>) -> Result<PathBuf> {
        let path = self.key_path(kind, index);
        let (rows, cols) = data.dim();

        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(STAGING_MAGIC)?;
        writer.write_u64::<LittleEndian>(rows as u64)?;
        writer.write_u64::<LittleEndian>(cols as u64)?;
        for &v in data.iter() {
            writer.write_f32::<LittleEndian>(v)?;
        }
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| MosaicError::Io(e.into_error()))?
            .sync_all()?;

        Ok(path)
    }

    /// Remove the staging directory and all staged artifacts.
    pub fn release(self) -> Result<()> {
        debug!(token = %self.token, "Releasing staging area");
        self.dir.close()?;
        Ok(())
    }
}

/// Read-only memory map of a staged array.
pub struct MappedArray {
    mmap: Mmap,
    rows: usize,
    cols: usize,
}

impl MappedArray {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < STAGING_HEADER_SIZE {
            return Err(MosaicError::Staging(format!(
                "{} is too short for a staging header",
                path.display()
            )));
        }
        let mut header = &mmap[..STAGING_HEADER_SIZE];
        let mut magic = [0u8; 8];
        header.read_exact(&mut magic)?;
        if &magic != STAGING_MAGIC {
            return Err(MosaicError::Staging(format!(
                "{} is not a staged array",
                path.display()
            )));
        }
        let rows = header.read_u64::<LittleEndian>()? as usize;
        let cols = header.read_u64::<LittleEndian>()? as usize;

        let expected = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .and_then(|n| n.checked_add(STAGING_HEADER_SIZE));
        if expected != Some(mmap.len()) {
            return Err(MosaicError::Staging(format!(
                "{} holds {} bytes, header says {}x{}",
                path.display(),
                mmap.len(),
                rows,
                cols
            )));
        }

        Ok(Self { mmap, rows, cols })
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Decode `rows` into `out`, which must hold exactly `rows.len() * cols` values.
    pub fn read_rows_into(&self, rows: Range<usize>, out: &mut [f32]) -> Result<()> {
        if rows.end > self.rows || rows.start > rows.end || out.len() != rows.len() * self.cols {
            return Err(MosaicError::Staging(format!(
                "row range {:?} does not fit a {}x{} array",
                rows, self.rows, self.cols
            )));
        }
        let row_bytes = self.cols * std::mem::size_of::<f32>();
        let start = STAGING_HEADER_SIZE + rows.start * row_bytes;
        let end = STAGING_HEADER_SIZE + rows.end * row_bytes;
        LittleEndian::read_f32_into(&self.mmap[start..end], out);
        Ok(())
    }

    pub fn to_array(&self) -> Result<Array2<f32>> {
        let mut data = vec![0.0f32; self.rows * self.cols];
        self.read_rows_into(0..self.rows, &mut data)?;
        Ok(Array2::from_shape_vec((self.rows, self.cols), data)?)
    }
}

/// Destination for trimmed chunk results.
///
/// The driver hands over each chunk before it starts the next one and asks
/// for the stitched rows once all chunks are staged.
pub trait ChunkSink {
    fn stage(&mut self, bounds: &ChunkBounds, result: Array2<f32>) -> Result<()>;

    fn assemble(&mut self, rows: usize, cols: usize) -> Result<Array2<f32>>;
}

/// Keeps chunk results resident.
#[derive(Default)]
pub struct MemoryStaging {
    chunks: Vec<(usize, Array2<f32>)>,
}

impl MemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkSink for MemoryStaging {
    fn stage(&mut self, bounds: &ChunkBounds, result: Array2<f32>) -> Result<()> {
        self.chunks.push((bounds.output_start, result));
        Ok(())
    }

    fn assemble(&mut self, rows: usize, cols: usize) -> Result<Array2<f32>> {
        let mut chunks = std::mem::take(&mut self.chunks);
        chunks.sort_by_key(|(start, _)| *start);
        stitch(chunks, rows, cols)
    }
}

/// Writes each chunk result to the run's staging area.
pub struct DiskStaging<'a> {
    area: &'a StagingArea,
    staged: Vec<(usize, PathBuf)>,
}

impl<'a> DiskStaging<'a> {
    pub fn new(area: &'a StagingArea) -> Self {
        Self {
            area,
            staged: Vec::new(),
        }
    }
}

impl ChunkSink for DiskStaging<'_> {
    fn stage(&mut self, bounds: &ChunkBounds, result: Array2<f32>) -> Result<()> {
        let path = self.area.write_array("chunk", bounds.index, result.view())?;
        debug!(chunk = bounds.index, path = %path.display(), "Chunk staged");
        self.staged.push((bounds.output_start, path));
        Ok(())
    }

    fn assemble(&mut self, rows: usize, cols: usize) -> Result<Array2<f32>> {
        let mut staged = std::mem::take(&mut self.staged);
        staged.sort_by_key(|(start, _)| *start);

        let mut parts = Vec::with_capacity(staged.len());
        for (start, path) in &staged {
            parts.push((*start, MappedArray::open(path)?.to_array()?));
        }
        let merged = stitch(parts, rows, cols)?;

        for (_, path) in &staged {
            fs::remove_file(path)?;
        }
        Ok(merged)
    }
}

/// Concatenate row blocks sorted by start row, checking they tile `rows x cols`.
fn stitch(parts: Vec<(usize, Array2<f32>)>, rows: usize, cols: usize) -> Result<Array2<f32>> {
    let mut next = 0;
    for (start, block) in &parts {
        if *start != next || block.ncols() != cols {
            return Err(MosaicError::Staging(format!(
                "chunk at row {} ({}x{}) does not continue row {} of a {}-column mosaic",
                start,
                block.nrows(),
                block.ncols(),
                next,
                cols
            )));
        }
        next += block.nrows();
    }
    if next != rows {
        return Err(MosaicError::Staging(format!(
            "staged chunks cover {next} of {rows} rows"
        )));
    }

    let views: Vec<ArrayView2<f32>> = parts.iter().map(|(_, b)| b.view()).collect();
    Ok(ndarray::concatenate(Axis(0), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_write_and_map_round_trip() {
        let area = StagingArea::new(None).unwrap();
        let data = arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let path = area.write_array("layer", 0, data.view()).unwrap();

        let mapped = MappedArray::open(&path).unwrap();
        assert_eq!(mapped.dim(), (2, 3));
        let mut row = vec![0.0; 3];
        mapped.read_rows_into(1..2, &mut row).unwrap();
        assert_eq!(row, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_key_paths_carry_token() {
        let area = StagingArea::new(None).unwrap();
        let name = area.key_path("chunk", 3);
        let name = name.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(area.token()));
        assert!(name.ends_with("_chunk_3.f32"));
    }

    #[test]
    fn test_stitch_rejects_gap() {
        let a = Array2::<f32>::zeros((2, 3));
        let b = Array2::<f32>::zeros((2, 3));
        assert!(stitch(vec![(0, a), (3, b)], 5, 3).is_err());
    }
}
