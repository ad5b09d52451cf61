//! Point sampling
//!
//! Neighborhood-averaged values at CRS or WGS84 positions.

mod point;

pub use point::{sample_lonlat, sample_lonlat_with, sample_window_mean, PointSample};
