use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::debug;

use crate::consts::PARALLEL_LAYER_THRESHOLD;
use crate::error::{MosaicError, Result};
use crate::raster::Sample;

/// Ground spacing of the pixel grid, used to turn pixel distances into ground units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSpacing {
    pub x: f64,
    pub y: f64,
}

/// Proximity-to-border weights for one layer.
///
/// Each valid pixel gets `min(d / distance, 1)`, where `d` is the ground
/// distance to the nearest nodata pixel; pixels outside the raster count as
/// nodata. Nodata pixels get 0. Valid weights are therefore in (0, 1].
pub fn feather_weights(
    layer: ArrayView2<f32>,
    nodata: f32,
    spacing: PixelSpacing,
    distance: f64,
) -> Result<Array2<f32>> {
    if !(distance.is_finite() && distance > 0.0) {
        return Err(MosaicError::InvalidFeather(distance));
    }
    if !(spacing.x > 0.0 && spacing.y > 0.0) {
        return Err(MosaicError::InvalidFeather(spacing.x.min(spacing.y)));
    }

    let (h, w) = layer.dim();
    let dist_sq = squared_distance_to_nodata(layer, nodata, spacing);

    let mut out = Array2::<f32>::zeros((h, w));
    for ((r, c), weight) in out.indexed_iter_mut() {
        if Sample::classify(layer[[r, c]], nodata).is_valid() {
            let d = dist_sq[[r + 1, c + 1]].sqrt();
            *weight = (d / distance).min(1.0) as f32;
        }
    }
    Ok(out)
}

/// Feather every layer, in parallel when there are enough of them.
pub fn feather_layers(
    layers: &[ArrayView2<f32>],
    nodata: f32,
    spacing: PixelSpacing,
    distance: f64,
) -> Result<Vec<Array2<f32>>> {
    debug!(layers = layers.len(), distance, "Computing feather weights");
    if layers.len() >= PARALLEL_LAYER_THRESHOLD {
        layers
            .par_iter()
            .map(|l| feather_weights(l.view(), nodata, spacing, distance))
            .collect()
    } else {
        layers
            .iter()
            .map(|l| feather_weights(l.view(), nodata, spacing, distance))
            .collect()
    }
}

/// Exact squared euclidean distance transform on a grid padded by one
/// nodata pixel on every side. Separable: columns first, then rows.
fn squared_distance_to_nodata(
    layer: ArrayView2<f32>,
    nodata: f32,
    spacing: PixelSpacing,
) -> Array2<f64> {
    let (h, w) = layer.dim();
    let mut grid = Array2::<f64>::zeros((h + 2, w + 2));
    for ((r, c), &v) in layer.indexed_iter() {
        if Sample::classify(v, nodata).is_valid() {
            grid[[r + 1, c + 1]] = f64::INFINITY;
        }
    }

    let mut scratch = Envelope::with_capacity(h.max(w) + 2);
    for mut column in grid.axis_iter_mut(Axis(1)) {
        let input: Vec<f64> = column.to_vec();
        scratch.transform(&input, spacing.y);
        column
            .iter_mut()
            .zip(scratch.output.iter())
            .for_each(|(dst, &v)| *dst = v);
    }
    for mut row in grid.axis_iter_mut(Axis(0)) {
        let input: Vec<f64> = row.to_vec();
        scratch.transform(&input, spacing.x);
        row.iter_mut()
            .zip(scratch.output.iter())
            .for_each(|(dst, &v)| *dst = v);
    }
    grid
}

/// Lower envelope of parabolas for the 1-D distance transform.
struct Envelope {
    sites: Vec<usize>,
    bounds: Vec<f64>,
    output: Vec<f64>,
}

impl Envelope {
    fn with_capacity(n: usize) -> Self {
        Self {
            sites: Vec::with_capacity(n),
            bounds: Vec::with_capacity(n),
            output: Vec::with_capacity(n),
        }
    }

    fn transform(&mut self, f: &[f64], spacing: f64) {
        self.sites.clear();
        self.bounds.clear();
        self.output.clear();

        for (q, &fq) in f.iter().enumerate() {
            if !fq.is_finite() {
                continue;
            }
            let xq = q as f64 * spacing;
            let mut s = f64::NEG_INFINITY;
            while let (Some(&p), Some(&z)) = (self.sites.last(), self.bounds.last()) {
                let xp = p as f64 * spacing;
                s = ((fq + xq * xq) - (f[p] + xp * xp)) / (2.0 * (xq - xp));
                if s <= z {
                    self.sites.pop();
                    self.bounds.pop();
                    s = f64::NEG_INFINITY;
                } else {
                    break;
                }
            }
            self.sites.push(q);
            self.bounds.push(s);
        }

        if self.sites.is_empty() {
            self.output.resize(f.len(), f64::INFINITY);
            return;
        }
        let mut k = 0;
        for q in 0..f.len() {
            let xq = q as f64 * spacing;
            while k + 1 < self.sites.len() && self.bounds[k + 1] < xq {
                k += 1;
            }
            let p = self.sites[k];
            let d = xq - p as f64 * spacing;
            self.output.push(d * d + f[p]);
        }
    }
}
