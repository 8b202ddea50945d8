use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use quantmosaic_core::consts::ALIGNMENT_TOLERANCE;
use quantmosaic_core::io::geotiff::read_raster;
use quantmosaic_core::prep::check_aligned;
use quantmosaic_core::raster::Sample;

#[derive(Args)]
pub struct InfoArgs {
    /// Input GeoTIFF files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let mut grids = Vec::with_capacity(args.files.len());

    for path in &args.files {
        let raster =
            read_raster(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let grid = &raster.grid;
        let bounds = grid.bounds();
        let gt = grid.geo_transform;

        println!("File:        {}", path.display());
        println!("Dimensions:  {}x{}", grid.width, grid.height);
        println!("Pixel size:  {} x {}", grid.pixel_width(), grid.pixel_height());
        println!("Origin:      ({}, {})", gt[0], gt[3]);
        if grid.is_rotated() {
            println!("Rotation:    ({}, {})", gt[2], gt[4]);
        }
        println!(
            "Bounds:      x {} .. {}, y {} .. {}",
            bounds.x_min, bounds.x_max, bounds.y_min, bounds.y_max
        );
        if grid.geo_keys.is_empty() {
            println!("Projection:  none");
        } else {
            let keys = grid.geo_keys.directory.get(3).copied().unwrap_or(0);
            println!("Projection:  {} GeoKeys", keys);
        }
        match raster.nodata {
            Some(nodata) => println!("Nodata:      {}", nodata),
            None => println!("Nodata:      unset"),
        }

        let nodata = raster.nodata.map(|v| v as f32).unwrap_or(f32::NAN);
        let valid: Vec<f32> = raster
            .data
            .iter()
            .filter_map(|&v| Sample::classify(v, nodata).value())
            .collect();
        println!("Valid:       {} of {}", valid.len(), raster.data.len());
        if !valid.is_empty() {
            let min = valid.iter().copied().fold(f32::INFINITY, f32::min);
            let max = valid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            println!("Range:       {} .. {}", min, max);
        }
        println!();

        grids.push(raster.grid);
    }

    if grids.len() > 1 {
        match check_aligned(&grids, ALIGNMENT_TOLERANCE) {
            Ok(()) => println!("All {} rasters are aligned", grids.len()),
            Err(e) => println!("Not aligned: {}", e),
        }
    }
    Ok(())
}
