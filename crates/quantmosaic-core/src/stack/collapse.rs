use ndarray::{Array2, ArrayView3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_NODATA, DEFAULT_QUANTILE, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{MosaicError, Result};
use crate::kernel::KernelTable;
use crate::raster::Sample;

use super::quantile::{median, weighted_quantile};

/// Parameters of the neighbourhood collapse.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseParams {
    /// Target quantile in [0, 1] (default: 0.5).
    pub quantile: f64,
    /// Weighted quantile when true, plain median of the surviving samples otherwise.
    pub weighted: bool,
    pub nodata: f32,
}

impl Default for CollapseParams {
    fn default() -> Self {
        Self {
            quantile: DEFAULT_QUANTILE,
            weighted: true,
            nodata: DEFAULT_NODATA,
        }
    }
}

impl CollapseParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quantile) {
            return Err(MosaicError::InvalidQuantile(self.quantile));
        }
        Ok(())
    }
}

/// Collapse a (row, col, time) stack to a 2-D composite.
///
/// Every output pixel gathers the kernel neighbourhood. Neighbours outside
/// the stack on any axis are dropped (never clamped and reused), as are
/// neighbours more than `(depth - 1) / 2` layers away in time and nodata
/// samples. Survivors are weighted by `kernel weight * feather` and
/// reduced with the weighted quantile. Pixels without any weighted survivor
/// get the nodata sentinel.
///
/// Parallelizes at the row level for stacks >= 256x256 pixels.
pub fn collapse(
    stack: ArrayView3<f32>,
    feather: Option<ArrayView3<f32>>,
    kernel: &KernelTable,
    params: &CollapseParams,
) -> Result<Array2<f32>> {
    params.validate()?;
    let (h, w, depth) = stack.dim();
    if h == 0 || w == 0 || depth == 0 {
        return Err(MosaicError::EmptyStack);
    }
    if let Some(f) = &feather {
        if f.dim() != stack.dim() {
            return Err(MosaicError::ShapeMismatch {
                expected: stack.dim(),
                actual: f.dim(),
            });
        }
    }
    if kernel.depth() != depth {
        return Err(MosaicError::InvalidKernel(format!(
            "kernel built for {} layers, stack has {}",
            kernel.depth(),
            depth
        )));
    }

    let hood = Neighbourhood {
        stack,
        feather,
        kernel,
        params,
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        // Row-parallel: each row allocates its own neighbourhood scratch
        let rows: Vec<Vec<f32>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut scratch = Vec::with_capacity(kernel.len());
                (0..w)
                    .map(|col| hood.collapse_pixel(row, col, &mut scratch))
                    .collect()
            })
            .collect();
        Ok(Array2::from_shape_vec((h, w), rows.concat())?)
    } else {
        let mut result = Array2::<f32>::zeros((h, w));
        let mut scratch = Vec::with_capacity(kernel.len());
        for row in 0..h {
            for col in 0..w {
                result[[row, col]] = hood.collapse_pixel(row, col, &mut scratch);
            }
        }
        Ok(result)
    }
}

struct Neighbourhood<'a> {
    stack: ArrayView3<'a, f32>,
    feather: Option<ArrayView3<'a, f32>>,
    kernel: &'a KernelTable,
    params: &'a CollapseParams,
}

impl Neighbourhood<'_> {
    fn collapse_pixel(&self, row: usize, col: usize, scratch: &mut Vec<(f32, f32)>) -> f32 {
        let (h, w, depth) = self.stack.dim();
        let z_origin = self.kernel.z_origin() as isize;
        scratch.clear();
        let mut weight_sum = 0.0f64;

        for offset in self.kernel.offsets() {
            // Temporal reach is symmetric: for even depth the last layer is never read.
            if offset.dz.abs() > z_origin {
                continue;
            }
            let x = row as isize + offset.dx;
            let y = col as isize + offset.dy;
            let z = z_origin + offset.dz;
            if x < 0 || x >= h as isize || y < 0 || y >= w as isize || z < 0 || z >= depth as isize
            {
                continue;
            }
            let idx = [x as usize, y as usize, z as usize];

            match Sample::classify(self.stack[idx], self.params.nodata) {
                Sample::NoData => continue,
                Sample::Valid(value) => {
                    let feather = self.feather.as_ref().map_or(1.0, |f| f[idx]);
                    let weight = offset.weight * feather;
                    weight_sum += weight as f64;
                    scratch.push((value, weight));
                }
            }
        }

        if weight_sum <= 0.0 {
            return self.params.nodata;
        }
        for sample in scratch.iter_mut() {
            sample.1 = (sample.1 as f64 / weight_sum) as f32;
        }

        let collapsed = if self.params.weighted {
            weighted_quantile(scratch, self.params.quantile)
        } else {
            let mut values: Vec<f32> = scratch
                .iter()
                .filter(|&&(_, w)| w != 0.0)
                .map(|&(v, _)| v)
                .collect();
            median(&mut values)
        };
        collapsed.unwrap_or(self.params.nodata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_rejects_kernel_depth_mismatch() {
        let stack = Array3::<f32>::zeros((3, 3, 3));
        let kernel = KernelTable::uniform(2).unwrap();
        let params = CollapseParams::default();
        assert!(collapse(stack.view(), None, &kernel, &params).is_err());
    }

    #[test]
    fn test_rejects_bad_quantile() {
        let stack = Array3::<f32>::zeros((3, 3, 3));
        let kernel = KernelTable::uniform(3).unwrap();
        let params = CollapseParams {
            quantile: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            collapse(stack.view(), None, &kernel, &params),
            Err(MosaicError::InvalidQuantile(_))
        ));
    }

    #[test]
    fn test_constant_stack_is_preserved() {
        let stack = Array3::<f32>::from_elem((4, 5, 3), 7.0);
        let kernel = KernelTable::uniform(3).unwrap();
        let out = collapse(stack.view(), None, &kernel, &CollapseParams::default()).unwrap();
        assert_eq!(out.dim(), (4, 5));
        assert!(out.iter().all(|&v| (v - 7.0).abs() < 1e-6));
    }
}
