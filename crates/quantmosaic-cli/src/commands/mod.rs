pub mod config;
pub mod info;
pub mod mosaic;
pub mod order;
