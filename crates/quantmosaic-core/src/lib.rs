pub mod consts;
pub mod error;
pub mod io;
pub mod kernel;
pub mod mosaic;
pub mod pipeline;
pub mod prep;
pub mod raster;
pub mod stack;
pub mod temporal;

pub use error::{MosaicError, Result};
pub use kernel::{KernelConfig, KernelTable};
pub use raster::{GridSpec, Mosaic, Raster, RasterStack, Sample};
