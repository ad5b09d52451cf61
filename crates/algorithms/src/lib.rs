//! # limnosat algorithms
//!
//! Pixel and point algorithms of the chlorophyll-a pipeline.
//!
//! ## Available Algorithm Categories
//!
//! - **imagery**: two-band math and the blue/red chlorophyll-a retrieval
//! - **sampling**: neighborhood-averaged point sampling at WGS84 coordinates
//! - **statistics**: bloom indicators and per-cell statistics over raster stacks

pub mod imagery;
pub mod rounding;
pub mod sampling;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{band_math_pair, blue_red_chla, chla_pixel};
    pub use crate::rounding::round_half_even;
    pub use crate::sampling::{sample_lonlat, sample_window_mean, PointSample};
    pub use crate::statistics::{
        bloom_indicators, cell_statistics, BloomIndicators, BloomParams, CellStatistic,
    };
    pub use limnosat_core::prelude::*;
}
