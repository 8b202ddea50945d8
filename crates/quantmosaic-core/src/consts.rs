/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum layer count to use layer-level Rayon parallelism.
pub const PARALLEL_LAYER_THRESHOLD: usize = 4;

/// Default nodata sentinel for backscatter composites.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Default target quantile (the weighted median).
pub const DEFAULT_QUANTILE: f64 = 0.5;

/// Spatial kernel width and height in cells.
pub const KERNEL_SIZE: usize = 3;

/// Subsamples per axis when integrating a cell's coverage of the kernel ellipsoid.
pub const KERNEL_SUPERSAMPLE: usize = 8;

/// Default feather search distance, in ground units of the reference grid.
pub const DEFAULT_FEATHER_DISTANCE: f64 = 5000.0;

/// Absolute tolerance when comparing pixel sizes and grid origins.
pub const ALIGNMENT_TOLERANCE: f64 = 0.001;

/// Magic bytes at the start of every staged array file.
pub const STAGING_MAGIC: &[u8; 8] = b"QMSTAGE1";

/// Size of the staged array header: magic + rows (u64) + cols (u64).
pub const STAGING_HEADER_SIZE: usize = 24;
