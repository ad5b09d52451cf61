//! # limnosat core
//!
//! Core types and I/O shared by the limnosat water-quality pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: single-band georeferenced grid of floating-point samples
//! - `GeoTransform`: affine mapping between pixel indices and CRS coordinates
//! - `CRS` and `CoordinateTransform`: reference systems and the WGS84 -> native
//!   reprojection pipeline
//! - `Neighborhood`: clipped pixel windows for point sampling
//! - Native GeoTIFF reading and atomic writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::{CoordinateTransform, TransformCache, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Neighborhood, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CoordinateTransform, TransformCache, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Neighborhood, Raster, RasterElement};
}
