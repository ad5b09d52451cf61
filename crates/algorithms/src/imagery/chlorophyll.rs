//! Blue/red band-ratio chlorophyll-a retrieval
//!
//! ```text
//! chl_a = 10^(1.48 * 10^(-0.3 * blue / red)) - 1      [ug/L]
//! ```
//!
//! evaluated on water-leaving reflectance bands (Landsat OLI 483/482 nm and
//! 655/654 nm) and rounded to one decimal. A zero reflectance in either band
//! marks a pixel without a usable retrieval.

use crate::imagery::band_math_pair;
use crate::rounding::round_half_even;
use limnosat_core::raster::Raster;
use limnosat_core::Result;

const OUTER_COEFF: f64 = 1.48;
const RATIO_COEFF: f64 = -0.3;

/// Decimal places kept in retrieved concentrations
pub const CHLA_DECIMALS: i32 = 1;

/// Chlorophyll-a concentration for one pixel.
///
/// `None` when either reflectance is exactly zero or NaN, and when the
/// formula overflows (only reachable for extreme negative ratios).
pub fn chla_pixel(blue: f64, red: f64) -> Option<f64> {
    if blue.is_nan() || red.is_nan() || blue == 0.0 || red == 0.0 {
        return None;
    }

    let exponent = OUTER_COEFF * 10f64.powf(RATIO_COEFF * (blue / red));
    let value = 10f64.powf(exponent) - 1.0;

    value
        .is_finite()
        .then(|| round_half_even(value, CHLA_DECIMALS))
}

/// Apply [`chla_pixel`] to two co-registered bands.
///
/// The output has the blue band's dimensions, transform and CRS, with NaN as
/// nodata wherever either band is zero, NaN or nodata.
pub fn blue_red_chla(blue: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    band_math_pair(blue, red, chla_pixel)
}
