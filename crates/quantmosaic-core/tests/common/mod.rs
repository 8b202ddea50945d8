#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3};

use quantmosaic_core::io::geotiff::write_raster;
use quantmosaic_core::raster::{GeoKeys, GridSpec};

pub const NODATA: f32 = -9999.0;

/// Deterministic pseudo-random stack with roughly one nodata sample in eleven.
pub fn noisy_stack(h: usize, w: usize, depth: usize, seed: u64) -> Array3<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    Array3::from_shape_fn((h, w, depth), |_| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let bits = (state >> 33) as u32;
        if bits % 11 == 0 {
            NODATA
        } else {
            (bits % 10_000) as f32 / 100.0
        }
    })
}

/// Stack where every pixel of layer `t` holds `values[t]`.
pub fn layered_stack(h: usize, w: usize, values: &[f32]) -> Array3<f32> {
    Array3::from_shape_fn((h, w, values.len()), |(_, _, t)| values[t])
}

/// North-up grid with 10 m pixels and a UTM-style GeoKey directory.
pub fn utm_grid(width: usize, height: usize, x0: f64, y0: f64) -> GridSpec {
    GridSpec {
        width,
        height,
        geo_transform: [x0, 10.0, 0.0, y0, 0.0, -10.0],
        geo_keys: GeoKeys {
            // Version 1.1.0, 3 keys: model type projected, raster pixel-is-area, EPSG:32632
            directory: vec![1, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 1, 3072, 0, 1, 32632],
            double_params: Vec::new(),
            ascii_params: String::new(),
        },
    }
}

/// Sentinel-1 style file name carrying `stamp` (`YYYYMMDDTHHMMSS`) in the
/// acquisition-time field.
pub fn s1_name(stamp: &str) -> String {
    format!("S1A_IW_GRDH_1SDV_Gamma0_{stamp}_{stamp}_VV.tif")
}

/// Write a Float32 GeoTIFF tile into `dir` and return its path.
pub fn write_tile(dir: &Path, name: &str, data: &Array2<f32>, grid: &GridSpec) -> PathBuf {
    let path = dir.join(name);
    write_raster(&path, data.view(), grid, Some(NODATA)).expect("write test tile");
    path
}
