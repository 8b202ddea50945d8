use serde::{Deserialize, Serialize};

use crate::consts::{KERNEL_SIZE, KERNEL_SUPERSAMPLE};
use crate::error::{MosaicError, Result};

/// How a kernel cell's weight falls off with distance from the centre.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DistanceWeighting {
    /// Footprint coverage only.
    #[default]
    Uniform,
    /// Coverage scaled by `1 - d`, with `d` the normalized ellipsoidal distance.
    Linear,
    /// Coverage scaled by a Gaussian of the euclidean cell distance.
    Gaussian { sigma: f64 },
}

impl std::fmt::Display for DistanceWeighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform => write!(f, "Uniform"),
            Self::Linear => write!(f, "Linear"),
            Self::Gaussian { sigma } => write!(f, "Gaussian (sigma={sigma})"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub weighting: DistanceWeighting,
    /// Weight boundary cells by the fraction of their volume inside the
    /// kernel ellipsoid instead of an in/out test on the cell centre.
    pub edge_weights: bool,
    pub remove_zero_weights: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            weighting: DistanceWeighting::Uniform,
            edge_weights: true,
            remove_zero_weights: true,
        }
    }
}

/// One neighbour of the stencil: row, column and time offsets plus weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelOffset {
    pub dx: isize,
    pub dy: isize,
    pub dz: isize,
    pub weight: f32,
}

/// Immutable offset/weight table for a 3x3xD neighbourhood.
///
/// Temporal offsets are relative to `z_origin()`, so `z_origin() + dz`
/// addresses a layer of a stack with the table's depth.
#[derive(Clone, Debug)]
pub struct KernelTable {
    offsets: Vec<KernelOffset>,
    depth: usize,
}

impl KernelTable {
    /// Build the ellipsoidal kernel for a stack of `depth` layers.
    ///
    /// Before zero-weight removal the table holds exactly `3 * 3 * depth`
    /// entries in (dx, dy, dz) lexicographic order.
    pub fn build(depth: usize, config: &KernelConfig) -> Result<Self> {
        if depth == 0 {
            return Err(MosaicError::InvalidKernel("depth must be at least 1".into()));
        }
        if let DistanceWeighting::Gaussian { sigma } = config.weighting {
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err(MosaicError::InvalidKernel(format!(
                    "gaussian sigma must be positive, got {sigma}"
                )));
            }
        }

        let radius = (KERNEL_SIZE / 2) as isize;
        let semi_xy = KERNEL_SIZE as f64 / 2.0;
        let semi_z = depth as f64 / 2.0;
        let z_centre = (depth as f64 - 1.0) / 2.0;
        let z_origin = ((depth - 1) / 2) as isize;

        let mut offsets = Vec::with_capacity(KERNEL_SIZE * KERNEL_SIZE * depth);
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for z in 0..depth {
                    let cx = dx as f64;
                    let cy = dy as f64;
                    let cz = z as f64 - z_centre;

                    let coverage = if config.edge_weights {
                        cell_coverage(cx, cy, cz, semi_xy, semi_z)
                    } else if ellipsoid_distance(cx, cy, cz, semi_xy, semi_z) <= 1.0 {
                        1.0
                    } else {
                        0.0
                    };

                    let falloff = match config.weighting {
                        DistanceWeighting::Uniform => 1.0,
                        DistanceWeighting::Linear => {
                            (1.0 - ellipsoid_distance(cx, cy, cz, semi_xy, semi_z)).max(0.0)
                        }
                        DistanceWeighting::Gaussian { sigma } => {
                            let d2 = cx * cx + cy * cy + cz * cz;
                            (-d2 / (2.0 * sigma * sigma)).exp()
                        }
                    };

                    offsets.push(KernelOffset {
                        dx,
                        dy,
                        dz: z as isize - z_origin,
                        weight: (coverage * falloff) as f32,
                    });
                }
            }
        }

        if config.remove_zero_weights {
            offsets.retain(|o| o.weight > 0.0);
        }
        Self::from_offsets(offsets, depth)
    }

    /// Full 3x3xD box with equal weights.
    pub fn uniform(depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(MosaicError::InvalidKernel("depth must be at least 1".into()));
        }
        let radius = (KERNEL_SIZE / 2) as isize;
        let z_origin = ((depth - 1) / 2) as isize;
        let mut offsets = Vec::with_capacity(KERNEL_SIZE * KERNEL_SIZE * depth);
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for z in 0..depth as isize {
                    offsets.push(KernelOffset {
                        dx,
                        dy,
                        dz: z - z_origin,
                        weight: 1.0,
                    });
                }
            }
        }
        Self::from_offsets(offsets, depth)
    }

    /// Wrap a caller-supplied table, normalizing its weights to sum to 1.
    pub fn from_offsets(mut offsets: Vec<KernelOffset>, depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(MosaicError::InvalidKernel("depth must be at least 1".into()));
        }
        if let Some(bad) = offsets
            .iter()
            .find(|o| !(o.weight.is_finite() && o.weight >= 0.0))
        {
            return Err(MosaicError::InvalidKernel(format!(
                "weight {} at ({}, {}, {}) is negative or not finite",
                bad.weight, bad.dx, bad.dy, bad.dz
            )));
        }

        let sum: f64 = offsets.iter().map(|o| o.weight as f64).sum();
        if sum <= 0.0 {
            return Err(MosaicError::InvalidKernel("all kernel weights are zero".into()));
        }
        for o in &mut offsets {
            o.weight = (o.weight as f64 / sum) as f32;
        }

        Ok(Self { offsets, depth })
    }

    pub fn offsets(&self) -> &[KernelOffset] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of stack layers this table was built for.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Layer index that temporal offsets are relative to; also the largest
    /// |dz| the collapse reads.
    pub fn z_origin(&self) -> usize {
        (self.depth - 1) / 2
    }

    /// Largest absolute row offset; the halo a row chunk needs.
    pub fn row_radius(&self) -> usize {
        self.offsets
            .iter()
            .map(|o| o.dx.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

fn ellipsoid_distance(x: f64, y: f64, z: f64, semi_xy: f64, semi_z: f64) -> f64 {
    ((x / semi_xy).powi(2) + (y / semi_xy).powi(2) + (z / semi_z).powi(2)).sqrt()
}

/// Fraction of the unit cell centred at (x, y, z) that lies inside the ellipsoid.
fn cell_coverage(x: f64, y: f64, z: f64, semi_xy: f64, semi_z: f64) -> f64 {
    let n = KERNEL_SUPERSAMPLE;
    let step = 1.0 / n as f64;
    let sub = |i: usize| (i as f64 + 0.5) * step - 0.5;

    let mut inside = 0usize;
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                if ellipsoid_distance(x + sub(i), y + sub(j), z + sub(k), semi_xy, semi_z) <= 1.0 {
                    inside += 1;
                }
            }
        }
    }
    inside as f64 / (n * n * n) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centre_cell_fully_covered() {
        assert!((cell_coverage(0.0, 0.0, 0.0, 1.5, 1.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_far_corner_uncovered() {
        assert_eq!(cell_coverage(1.0, 1.0, 4.0, 1.5, 1.5), 0.0);
    }

    #[test]
    fn test_z_origin() {
        assert_eq!(KernelTable::uniform(5).unwrap().z_origin(), 2);
        assert_eq!(KernelTable::uniform(4).unwrap().z_origin(), 1);
    }
}
