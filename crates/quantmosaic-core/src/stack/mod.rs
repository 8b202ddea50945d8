pub mod collapse;
pub mod quantile;

pub use collapse::{collapse, CollapseParams};
pub use quantile::{median, weighted_quantile, weighted_quantile_of};
