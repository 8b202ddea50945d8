//! Tile preparation: placing co-projected tiles on the reference grid and
//! computing their border feather weights.

pub mod align;
pub mod feather;

pub use align::{check_aligned, grid_offset, place_on_grid, GridOffset};
pub use feather::{feather_layers, feather_weights, PixelSpacing};
