//! Bloom indicators
//!
//! Summaries of one chlorophyll-a raster:
//!
//! - intensity: mean concentration of bloom pixels (ug/L)
//! - extent: area covered by bloom pixels (km2)
//! - severity: intensity x extent
//! - availability: share of the lake area covered by valid pixels (%)

use crate::rounding::round_half_even;
use limnosat_core::raster::{Raster, RasterElement};
use limnosat_core::{Error, Result};
use serde::{Deserialize, Serialize};

const M2_PER_KM2: f64 = 1.0e6;

/// Thresholds and areas used by [`bloom_indicators`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomParams {
    /// Lowest concentration counted as bloom (ug/L, inclusive)
    pub bloom_min: f64,
    /// Highest concentration counted as bloom (ug/L, inclusive)
    pub bloom_max: f64,
    /// Lowest concentration counted as a valid retrieval (inclusive)
    pub valid_min: f64,
    /// Highest concentration counted as a valid retrieval (inclusive)
    pub valid_max: f64,
    /// Area of one pixel in km2; `None` uses the raster's cell area, which
    /// needs a CRS in metres
    pub pixel_area_km2: Option<f64>,
    /// Lake surface area in km2; availability is only reported when set
    pub lake_area_km2: Option<f64>,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            bloom_min: 10.0,
            bloom_max: 30.0,
            valid_min: 0.01,
            valid_max: 30.0,
            pixel_area_km2: None,
            lake_area_km2: None,
        }
    }
}

impl BloomParams {
    /// Check thresholds are ordered and areas positive
    pub fn validate(&self) -> Result<()> {
        if !(self.bloom_min <= self.bloom_max) {
            return Err(Error::InvalidParameter {
                name: "bloom_min",
                value: self.bloom_min.to_string(),
                reason: format!("must not exceed bloom_max ({})", self.bloom_max),
            });
        }
        if !(self.valid_min <= self.valid_max) {
            return Err(Error::InvalidParameter {
                name: "valid_min",
                value: self.valid_min.to_string(),
                reason: format!("must not exceed valid_max ({})", self.valid_max),
            });
        }
        if let Some(area) = self.pixel_area_km2 {
            if !(area > 0.0) {
                return Err(Error::InvalidParameter {
                    name: "pixel_area_km2",
                    value: area.to_string(),
                    reason: "must be positive".into(),
                });
            }
        }
        if let Some(area) = self.lake_area_km2 {
            if !(area > 0.0) {
                return Err(Error::InvalidParameter {
                    name: "lake_area_km2",
                    value: area.to_string(),
                    reason: "must be positive".into(),
                });
            }
        }
        Ok(())
    }
}

/// Indicators of one scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BloomIndicators {
    /// Mean concentration of bloom pixels, `None` without bloom pixels
    pub intensity_ugl: Option<f64>,
    pub extent_km2: f64,
    pub severity: Option<f64>,
    /// `None` when no lake area was given
    pub availability_pct: Option<f64>,
    pub bloom_pixels: usize,
    pub valid_pixels: usize,
}

/// Compute bloom indicators of a chlorophyll-a raster.
///
/// NaN and nodata pixels belong to neither class. Intensity, extent and
/// severity are rounded to 3 decimals, availability to 1.
pub fn bloom_indicators<T: RasterElement>(
    chla: &Raster<T>,
    params: &BloomParams,
) -> Result<BloomIndicators> {
    params.validate()?;

    let pixel_area = match params.pixel_area_km2 {
        Some(area) => area,
        None => default_pixel_area(chla)?,
    };

    let mut bloom_sum = 0.0;
    let mut bloom_pixels = 0usize;
    let mut valid_pixels = 0usize;

    for v in chla.valid_values() {
        if v >= params.bloom_min && v <= params.bloom_max {
            bloom_sum += v;
            bloom_pixels += 1;
        }
        if v >= params.valid_min && v <= params.valid_max {
            valid_pixels += 1;
        }
    }

    let intensity = (bloom_pixels > 0).then(|| bloom_sum / bloom_pixels as f64);
    let extent = bloom_pixels as f64 * pixel_area;
    let severity = intensity.map(|i| i * extent);
    let availability = params
        .lake_area_km2
        .map(|lake| valid_pixels as f64 * pixel_area * 100.0 / lake);

    Ok(BloomIndicators {
        intensity_ugl: intensity.map(|v| round_half_even(v, 3)),
        extent_km2: round_half_even(extent, 3),
        severity: severity.map(|v| round_half_even(v, 3)),
        availability_pct: availability.map(|v| round_half_even(v, 1)),
        bloom_pixels,
        valid_pixels,
    })
}

/// Cell area in km2. Degree-based cells have no fixed area, so a raster in
/// geographic coordinates needs an explicit `pixel_area_km2`.
fn default_pixel_area<T: RasterElement>(chla: &Raster<T>) -> Result<f64> {
    if let Some(crs) = chla.crs() {
        if crs.is_geographic() {
            return Err(Error::InvalidParameter {
                name: "pixel_area_km2",
                value: "unset".into(),
                reason: format!("required for rasters in geographic coordinates ({crs})"),
            });
        }
    }
    Ok(chla.transform().cell_area() / M2_PER_KM2)
}
