pub mod geotiff;

pub use geotiff::{read_grid, read_raster, write_raster};
