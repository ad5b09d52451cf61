//! Statistics over chlorophyll-a rasters
//!
//! - **bloom**: per-scene bloom intensity, extent, severity and data availability
//! - **cell**: per-pixel statistics across a stack of co-registered rasters

pub mod bloom;
pub mod cell;

pub use bloom::{bloom_indicators, BloomIndicators, BloomParams};
pub use cell::{cell_statistics, CellStatistic};
