use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("At least 2 input rasters are required, got {0}")]
    TooFewInputs(usize),

    #[error("Only {viable} of {total} input rasters overlap the reference grid (need at least 2)")]
    TooFewTiles { viable: usize, total: usize },

    #[error("Cannot read acquisition time from {path}: {reason}")]
    AcquisitionTime { path: PathBuf, reason: String },

    #[error("Rasters are not aligned: {0}")]
    Alignment(String),

    #[error("Invalid quantile: {0} (must be within [0, 1])")]
    InvalidQuantile(f64),

    #[error("Invalid chunk count: {0} (must be at least 1)")]
    InvalidChunkCount(usize),

    #[error("Invalid feather distance: {0} (must be positive)")]
    InvalidFeather(f64),

    #[error("Invalid feather weight: {0} (must be finite and non-negative)")]
    InvalidFeatherWeight(f32),

    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("Unsupported raster: {0}")]
    UnsupportedRaster(String),

    #[error("Staging error: {0}")]
    Staging(String),

    #[error("Empty raster stack")]
    EmptyStack,
}

pub type Result<T> = std::result::Result<T, MosaicError>;
