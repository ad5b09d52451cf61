//! Band math operations
//!
//! Raster algebra over two co-registered bands, with missing data carried as
//! `Option` through the pixel function.

use limnosat_core::raster::{Raster, RasterElement};
use limnosat_core::{Error, Result};
use ndarray::Array2;
use rayon::prelude::*;

/// Apply `f` to every pair of co-located pixels of `a` and `b`.
///
/// Both rasters must have the same dimensions. `f` only sees pixels that are
/// valid in both inputs; a NaN or nodata pixel in either input, or a `None`
/// returned by `f`, produces NaN in the output. The output takes its
/// transform and CRS from `a` and declares NaN as nodata.
///
/// # Example
/// ```ignore
/// let ratio = band_math_pair(&blue, &red, |b, r| (r != 0.0).then(|| b / r))?;
/// ```
pub fn band_math_pair<F>(a: &Raster<f64>, b: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64, f64) -> Option<f64> + Sync + Send,
{
    a.ensure_same_shape(b)?;

    let (rows, cols) = a.shape();
    let nodata_a = a.nodata();
    let nodata_b = b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                // Safe: row < rows and col < cols for both rasters
                let va = unsafe { a.get_unchecked(row, col) };
                let vb = unsafe { b.get_unchecked(row, col) };

                let (Some(va), Some(vb)) = (va.valid(nodata_a), vb.valid(nodata_b)) else {
                    continue;
                };

                if let Some(v) = f(va, vb) {
                    *out = v;
                }
            }
            row_data
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    a.with_same_meta(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use limnosat_core::{GeoTransform, CRS};

    fn make_band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(5, 5, value);
        r.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        r.set_crs(Some(CRS::utm(17, true)));
        r
    }

    #[test]
    fn test_pair_applies_function() {
        let a = make_band(3.0);
        let b = make_band(7.0);
        let result = band_math_pair(&a, &b, |x, y| Some(x + y)).unwrap();
        assert!((result.get(2, 2).unwrap() - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_pair_none_becomes_nan() {
        let a = make_band(10.0);
        let b = make_band(0.0);
        let result = band_math_pair(&a, &b, |x, y| (y != 0.0).then(|| x / y)).unwrap();
        assert!(result.get(2, 2).unwrap().is_nan());
    }

    #[test]
    fn test_pair_propagates_nodata() {
        let mut a = make_band(3.0);
        a.set(1, 1, f64::NAN).unwrap();
        let mut b = make_band(2.0);
        b.set(3, 3, -9999.0).unwrap();
        b.set_nodata(Some(-9999.0));

        let result = band_math_pair(&a, &b, |x, y| Some(x * y)).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
        assert!(result.get(3, 3).unwrap().is_nan());
        assert_eq!(result.get(0, 0).unwrap(), 6.0);
    }

    #[test]
    fn test_pair_keeps_template_metadata() {
        let a = make_band(1.0);
        let b = make_band(1.0);
        let result = band_math_pair(&a, &b, |x, _| Some(x)).unwrap();
        assert_eq!(result.transform(), a.transform());
        assert_eq!(result.crs(), a.crs());
        assert!(result.nodata().unwrap().is_nan());
    }

    #[test]
    fn test_pair_size_mismatch() {
        let a = make_band(1.0);
        let b = Raster::filled(4, 5, 1.0);
        assert!(matches!(
            band_math_pair(&a, &b, |x, _| Some(x)),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
