use std::ops::Range;
use std::path::PathBuf;

use ndarray::{s, Array3, ArrayView2, Axis, CowArray, Ix3};
use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::raster::{check_feather_weights, RasterStack};

use super::staging::{MappedArray, StagingArea};

/// Rows of a stack, with the matching feather weights if the stack has them.
pub struct StackChunk<'a> {
    pub values: CowArray<'a, f32, Ix3>,
    pub feather: Option<CowArray<'a, f32, Ix3>>,
}

/// Anything the chunk driver can pull row windows of a (row, col, time) stack from.
pub trait StackSource {
    fn dim(&self) -> (usize, usize, usize);

    fn nodata(&self) -> f32;

    fn has_feather(&self) -> bool;

    fn read_rows(&self, rows: Range<usize>) -> Result<StackChunk<'_>>;
}

impl StackSource for RasterStack {
    fn dim(&self) -> (usize, usize, usize) {
        RasterStack::dim(self)
    }

    fn nodata(&self) -> f32 {
        RasterStack::nodata(self)
    }

    fn has_feather(&self) -> bool {
        self.feather().is_some()
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<StackChunk<'_>> {
        check_rows(&rows, self.dim().0)?;
        Ok(StackChunk {
            values: CowArray::from(self.values().slice(s![rows.clone(), .., ..])),
            feather: self
                .feather()
                .map(|f| CowArray::from(f.slice(s![rows, .., ..]))),
        })
    }
}

/// Stack whose layers live in memory-mapped staging files.
///
/// Only the requested row window is decoded, so resident memory follows the
/// chunk size rather than the stack size.
pub struct MappedStack {
    layers: Vec<MappedArray>,
    feather: Option<Vec<MappedArray>>,
    rows: usize,
    cols: usize,
    nodata: f32,
}

impl StackSource for MappedStack {
    fn dim(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.layers.len())
    }

    fn nodata(&self) -> f32 {
        self.nodata
    }

    fn has_feather(&self) -> bool {
        self.feather.is_some()
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<StackChunk<'_>> {
        check_rows(&rows, self.rows)?;
        let values = gather_rows(&self.layers, rows.clone(), self.cols)?;
        let feather = match &self.feather {
            Some(layers) => Some(CowArray::from(gather_rows(layers, rows, self.cols)?)),
            None => None,
        };
        Ok(StackChunk {
            values: CowArray::from(values),
            feather,
        })
    }
}

fn check_rows(rows: &Range<usize>, total: usize) -> Result<()> {
    if rows.start >= rows.end || rows.end > total {
        return Err(MosaicError::Staging(format!(
            "row range {rows:?} outside stack of {total} rows"
        )));
    }
    Ok(())
}

fn gather_rows(layers: &[MappedArray], rows: Range<usize>, cols: usize) -> Result<Array3<f32>> {
    let n = rows.len();
    let mut out = Array3::<f32>::zeros((n, cols, layers.len()));
    let mut buf = vec![0.0f32; n * cols];
    for (t, layer) in layers.iter().enumerate() {
        layer.read_rows_into(rows.clone(), &mut buf)?;
        let plane = ArrayView2::from_shape((n, cols), &buf[..])?;
        out.index_axis_mut(Axis(2), t).assign(&plane);
    }
    Ok(out)
}

/// Stages aligned layers one at a time into a [`MappedStack`].
pub struct MappedStackBuilder<'a> {
    area: &'a StagingArea,
    layers: Vec<PathBuf>,
    feather: Vec<PathBuf>,
    dim: Option<(usize, usize)>,
    with_feather: Option<bool>,
}

impl<'a> MappedStackBuilder<'a> {
    pub fn new(area: &'a StagingArea) -> Self {
        Self {
            area,
            layers: Vec::new(),
            feather: Vec::new(),
            dim: None,
            with_feather: None,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Stage one layer; either every layer carries feather weights or none does.
    pub fn push(&mut self, values: ArrayView2<f32>, feather: Option<ArrayView2<f32>>) -> Result<()> {
        let dim = values.dim();
        if let Some(expected) = self.dim {
            if dim != expected {
                return Err(MosaicError::Alignment(format!(
                    "layer {} is {}x{}, expected {}x{}",
                    self.layers.len(),
                    dim.0,
                    dim.1,
                    expected.0,
                    expected.1
                )));
            }
        }
        if let Some(expected) = self.with_feather {
            if expected != feather.is_some() {
                return Err(MosaicError::Staging(
                    "feather weights must be given for all layers or none".into(),
                ));
            }
        }

        if let Some(f) = feather {
            if f.dim() != dim {
                return Err(MosaicError::ShapeMismatch {
                    expected: (dim.0, dim.1, 1),
                    actual: (f.dim().0, f.dim().1, 1),
                });
            }
            check_feather_weights(f.iter())?;
        }

        // Paths are recorded only once every file of the layer is on disk.
        let index = self.layers.len();
        let layer_path = self.area.write_array("layer", index, values)?;
        let feather_path = feather
            .map(|f| self.area.write_array("feather", index, f))
            .transpose()?;

        self.layers.push(layer_path);
        self.feather.extend(feather_path);
        self.dim = Some(dim);
        self.with_feather = Some(!self.feather.is_empty());
        debug!(layer = index, "Layer staged");
        Ok(())
    }

    pub fn finish(self, nodata: f32) -> Result<MappedStack> {
        let (rows, cols) = self.dim.ok_or(MosaicError::EmptyStack)?;
        let layers = self
            .layers
            .iter()
            .map(|p| MappedArray::open(p))
            .collect::<Result<Vec<_>>>()?;
        let feather = if self.feather.is_empty() {
            None
        } else {
            Some(
                self.feather
                    .iter()
                    .map(|p| MappedArray::open(p))
                    .collect::<Result<Vec<_>>>()?,
            )
        };
        Ok(MappedStack {
            layers,
            feather,
            rows,
            cols,
            nodata,
        })
    }
}
