//! Neighborhood mean at a point
//!
//! A position is located on the grid by flooring the inverse affine
//! transform, then the valid samples of the window centered on that pixel are
//! averaged. Window cells outside the grid and NaN/nodata cells are left out
//! of both the sum and the count. A window without any valid sample yields
//! `None`, never `0.0`.

use limnosat_core::crs::{CoordinateTransform, TransformCache};
use limnosat_core::raster::{Neighborhood, Raster, RasterElement};
use limnosat_core::{Error, Result};

/// Outcome of sampling one position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSample {
    /// Mean of the valid window samples, `None` when there were none
    pub value: Option<f64>,
    /// Row of the pixel containing the position (may be outside the grid)
    pub row: i64,
    /// Column of the pixel containing the position (may be outside the grid)
    pub col: i64,
    /// Number of samples that entered the mean
    pub valid_count: usize,
}

/// Mean of the valid samples in the window around native CRS position `(x, y)`.
///
/// Fails only when the raster's transform cannot be inverted.
pub fn sample_window_mean<T: RasterElement>(
    raster: &Raster<T>,
    x: f64,
    y: f64,
    neighborhood: Neighborhood,
) -> Result<PointSample> {
    let (row, col) = raster
        .transform()
        .pixel_index(x, y)
        .ok_or(Error::DegenerateTransform)?;

    let (sum, count) = neighborhood
        .values(raster, row, col)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));

    Ok(PointSample {
        value: (count > 0).then(|| sum / count as f64),
        row,
        col,
        valid_count: count,
    })
}

/// 3x3 mean at WGS84 `(lon, lat)`.
///
/// The position is reprojected into the raster's CRS with a pipeline taken
/// from `cache` (built on first use for that CRS). Returns `Err` when the
/// raster has no CRS, the CRS is unknown or the projection fails; returns
/// `Ok(None)` when no valid pixel lies in the window.
pub fn sample_lonlat<T: RasterElement>(
    raster: &Raster<T>,
    cache: &mut TransformCache,
    lon: f64,
    lat: f64,
) -> Result<Option<f64>> {
    let crs = raster.require_crs()?;
    let pipeline = cache.from_wgs84(crs)?;
    sample_lonlat_with(raster, pipeline, lon, lat)
}

/// Like [`sample_lonlat`] with an explicit pipeline, whose target must be the
/// raster's CRS.
pub fn sample_lonlat_with<T: RasterElement>(
    raster: &Raster<T>,
    pipeline: &CoordinateTransform,
    lon: f64,
    lat: f64,
) -> Result<Option<f64>> {
    let crs = raster.require_crs()?;
    if !pipeline.target().is_equivalent(crs) {
        return Err(Error::CrsMismatch(
            pipeline.target().identifier(),
            crs.identifier(),
        ));
    }

    let (x, y) = pipeline.transform(lon, lat)?;
    let sample = sample_window_mean(raster, x, y, Neighborhood::Queen3x3)?;
    Ok(sample.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use limnosat_core::crs::CRS;
    use limnosat_core::raster::GeoTransform;

    const NAN: f64 = f64::NAN;

    /// 5x5 grid of 30 m cells, origin (1000, 2000), values row*10 + col
    fn grid() -> Raster<f64> {
        let data: Vec<f64> = (0..25).map(|i| ((i / 5) * 10 + i % 5) as f64).collect();
        let mut r = Raster::from_vec(data, 5, 5).unwrap();
        r.set_transform(GeoTransform::new(1000.0, 2000.0, 30.0, -30.0));
        r
    }

    /// CRS coordinates of the center of cell (row, col)
    fn center(row: usize, col: usize) -> (f64, f64) {
        GeoTransform::new(1000.0, 2000.0, 30.0, -30.0).pixel_to_geo(col, row)
    }

    #[test]
    fn interior_mean() {
        let r = grid();
        let (x, y) = center(2, 2);
        let s = sample_window_mean(&r, x, y, Neighborhood::Queen3x3).unwrap();
        assert_eq!((s.row, s.col), (2, 2));
        assert_eq!(s.valid_count, 9);
        assert_abs_diff_eq!(s.value.unwrap(), 22.0, epsilon = 1e-12);
    }

    #[test]
    fn corner_window_is_clipped() {
        let r = grid();
        let (x, y) = center(0, 0);
        let s = sample_window_mean(&r, x, y, Neighborhood::Queen3x3).unwrap();
        assert_eq!(s.valid_count, 4);
        // (0 + 1 + 10 + 11) / 4
        assert_abs_diff_eq!(s.value.unwrap(), 5.5, epsilon = 1e-12);
    }

    #[test]
    fn nan_excluded_from_sum_and_count() {
        let mut r = Raster::from_rows(&[
            vec![1.0, NAN, 3.0],
            vec![NAN, NAN, 6.0],
            vec![7.0, 8.0, NAN],
        ])
        .unwrap();
        r.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));

        let s = sample_window_mean(&r, 1.5, 1.5, Neighborhood::Queen3x3).unwrap();
        assert_eq!(s.valid_count, 5);
        assert_abs_diff_eq!(s.value.unwrap(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn declared_nodata_excluded() {
        let mut r = Raster::filled(3, 3, 2.0);
        r.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        r.set(1, 1, -9999.0).unwrap();
        r.set_nodata(Some(-9999.0));

        let s = sample_window_mean(&r, 1.5, 1.5, Neighborhood::Queen3x3).unwrap();
        assert_eq!(s.valid_count, 8);
        assert_abs_diff_eq!(s.value.unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn all_nan_window_is_none_not_zero() {
        let mut r = Raster::filled(3, 3, NAN);
        r.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        let s = sample_window_mean(&r, 1.5, 1.5, Neighborhood::Queen3x3).unwrap();
        assert_eq!(s.value, None);
        assert_eq!(s.valid_count, 0);
    }

    #[test]
    fn fully_outside_is_none() {
        let r = grid();
        // Window columns -4..=-2 never reach column 0
        let (x, y) = (1000.0 - 75.0, 2000.0 - 45.0);
        let s = sample_window_mean(&r, x, y, Neighborhood::Queen3x3).unwrap();
        assert_eq!(s.col, -3);
        assert_eq!(s.value, None);

        let s = sample_window_mean(&r, 1e9, -1e9, Neighborhood::Queen3x3).unwrap();
        assert_eq!(s.value, None);
    }

    #[test]
    fn just_outside_edge_uses_border_pixels() {
        let r = grid();
        // One cell right of the last column: window reaches column 4
        let (x, y) = (1000.0 + 5.5 * 30.0, 2000.0 - 2.5 * 30.0);
        let s = sample_window_mean(&r, x, y, Neighborhood::Queen3x3).unwrap();
        assert_eq!((s.row, s.col), (2, 5));
        assert_eq!(s.valid_count, 3);
        // (14 + 24 + 34) / 3
        assert_abs_diff_eq!(s.value.unwrap(), 24.0, epsilon = 1e-12);
    }

    #[test]
    fn single_cell_neighborhood() {
        let r = grid();
        let (x, y) = center(3, 1);
        let s = sample_window_mean(&r, x, y, Neighborhood::Single).unwrap();
        assert_eq!(s.value, Some(31.0));
    }

    #[test]
    fn degenerate_transform_is_error() {
        let mut r = grid();
        r.set_transform(GeoTransform::new(0.0, 0.0, 0.0, 0.0));
        assert!(matches!(
            sample_window_mean(&r, 1.0, 1.0, Neighborhood::Queen3x3),
            Err(Error::DegenerateTransform)
        ));
    }

    #[test]
    fn lonlat_without_crs_is_error() {
        let r = grid();
        let mut cache = TransformCache::new();
        assert!(matches!(
            sample_lonlat(&r, &mut cache, -79.0, 43.0),
            Err(Error::MissingCrs)
        ));
    }

    #[test]
    fn lonlat_on_utm_raster() {
        // 3x3 grid of 30 m cells around the zone 17 central meridian
        let utm = CRS::utm(17, true);
        let probe = CoordinateTransform::from_wgs84(&utm).unwrap();
        let (e, n) = probe.transform(-81.0, 43.5).unwrap();

        let mut r = Raster::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, NAN, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        r.set_transform(GeoTransform::new(e - 45.0, n + 45.0, 30.0, -30.0));
        r.set_crs(Some(utm));

        let mut cache = TransformCache::new();
        let v = sample_lonlat(&r, &mut cache, -81.0, 43.5).unwrap();
        assert_abs_diff_eq!(v.unwrap(), 5.0, epsilon = 1e-12);
        assert_eq!(cache.len(), 1);

        // Far away on the same raster
        assert_eq!(sample_lonlat(&r, &mut cache, -80.0, 44.0).unwrap(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn geographic_raster_roundtrips_through_pipeline() {
        let mut r = Raster::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        r.set_transform(GeoTransform::new(-80.0, 44.0, 0.5, -0.5));
        r.set_crs(Some(CRS::wgs84()));

        let mut cache = TransformCache::new();
        // Center of cell (0, 0); the window covers the whole 2x2 grid
        let v = sample_lonlat(&r, &mut cache, -79.75, 43.75).unwrap();
        assert_abs_diff_eq!(v.unwrap(), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn pipeline_for_other_crs_is_rejected() {
        let mut r = grid();
        r.set_crs(Some(CRS::utm(17, true)));
        let pipeline = CoordinateTransform::from_wgs84(&CRS::utm(18, true)).unwrap();
        assert!(matches!(
            sample_lonlat_with(&r, &pipeline, -79.0, 43.0),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
