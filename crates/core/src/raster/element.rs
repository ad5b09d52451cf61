//! Floating-point cell types

use num_traits::{Float, NumCast};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Band rasters in this pipeline are always floating point; missing data is
/// NaN on disk. [`RasterElement::valid`] is the single place where that
/// on-disk sentinel is turned into a tagged optional value.
pub trait RasterElement:
    Float + NumCast + Copy + Debug + Default + Send + Sync + 'static
{
    /// Name of the sample format, used in log and error messages
    const NAME: &'static str;

    /// Value written for missing data
    fn nodata() -> Self {
        Self::nan()
    }

    /// `Some(value)` unless the value is NaN or equals the declared nodata value
    fn valid(self, nodata: Option<Self>) -> Option<f64> {
        if self.is_nan() {
            return None;
        }
        if let Some(nd) = nodata {
            if !nd.is_nan() && (self - nd).abs() <= Self::epsilon() * <Self as NumCast>::from(100.0)? {
                return None;
            }
        }
        self.to_f64()
    }

    /// Convert from f64, mapping `None` to the nodata sentinel
    fn from_option(value: Option<f64>) -> Self {
        value
            .and_then(<Self as NumCast>::from)
            .unwrap_or_else(Self::nodata)
    }
}

impl RasterElement for f32 {
    const NAME: &'static str = "f32";
}

impl RasterElement for f64 {
    const NAME: &'static str = "f64";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_never_valid() {
        assert_eq!(f64::NAN.valid(None), None);
        assert_eq!(f32::NAN.valid(Some(-9999.0)), None);
    }

    #[test]
    fn declared_nodata_is_not_valid() {
        assert_eq!((-9999.0f64).valid(Some(-9999.0)), None);
        assert_eq!(0.0f64.valid(Some(-9999.0)), Some(0.0));
        assert_eq!(1.5f32.valid(Some(f32::NAN)), Some(1.5));
    }

    #[test]
    fn none_becomes_nan() {
        assert!(f64::from_option(None).is_nan());
        assert_eq!(f32::from_option(Some(2.5)), 2.5);
    }
}
