//! End-to-end scenarios for the retrieval, the sampler and the statistics,
//! going through GeoTIFF files the way the batch drivers do.

use approx::assert_abs_diff_eq;
use limnosat_algorithms::imagery::{blue_red_chla, chla_pixel};
use limnosat_algorithms::sampling::sample_lonlat;
use limnosat_algorithms::statistics::{bloom_indicators, cell_statistics, BloomParams, CellStatistic};
use limnosat_core::io::{read_geotiff, write_geotiff};
use limnosat_core::{CoordinateTransform, GeoTransform, Raster, TransformCache, CRS};

fn utm_band(rows: &[Vec<f64>]) -> Raster<f64> {
    let mut r = Raster::from_rows(rows).unwrap();
    r.set_transform(GeoTransform::new(630_000.0, 4_830_000.0, 30.0, -30.0));
    r.set_crs(Some(CRS::utm(17, true)));
    r
}

#[test]
fn zero_center_pixel_is_nodata_and_neighbors_agree() {
    let blue = utm_band(&[
        vec![10.0, 10.0, 10.0],
        vec![10.0, 0.0, 10.0],
        vec![10.0, 10.0, 10.0],
    ]);
    let red = utm_band(&vec![vec![5.0; 3]; 3]);

    let out = blue_red_chla(&blue, &red).unwrap();
    let expected = chla_pixel(10.0, 5.0).unwrap();
    let formula = ((10f64.powf(1.48 * 10f64.powf(-0.3 * 2.0)) - 1.0) * 10.0).round_ties_even() / 10.0;
    assert_eq!(expected, formula);

    for row in 0..3 {
        for col in 0..3 {
            let v = out.get(row, col).unwrap();
            if (row, col) == (1, 1) {
                assert!(v.is_nan());
            } else {
                assert_eq!(v, expected, "pixel ({row}, {col})");
            }
        }
    }
    assert_eq!(out.transform(), blue.transform());
    assert_eq!(out.crs(), blue.crs());
}

#[test]
fn retrieval_survives_geotiff_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let blue_path = dir.path().join("rhow_483.tif");
    let red_path = dir.path().join("rhow_655.tif");
    let out_path = dir.path().join("2013").join("scene.tif");

    write_geotiff(&utm_band(&[vec![0.021, 0.0], vec![0.018, 0.030]]), &blue_path, None).unwrap();
    write_geotiff(&utm_band(&[vec![0.012, 0.012], vec![f64::NAN, 0.010]]), &red_path, None).unwrap();

    let blue: Raster<f64> = read_geotiff(&blue_path).unwrap();
    let red: Raster<f64> = read_geotiff(&red_path).unwrap();
    let chla = blue_red_chla(&blue, &red).unwrap();
    write_geotiff(&chla, &out_path, None).unwrap();

    let back: Raster<f64> = read_geotiff(&out_path).unwrap();
    assert_eq!(back.crs().and_then(CRS::epsg), Some(32617));
    assert_eq!(back.get(0, 0).unwrap(), chla_pixel(0.021, 0.012).unwrap());
    assert!(back.get(0, 1).unwrap().is_nan());
    assert!(back.get(1, 0).unwrap().is_nan());
    assert_eq!(back.get(1, 1).unwrap(), chla_pixel(0.030, 0.010).unwrap());
}

#[test]
fn sample_mixed_window_from_file() {
    let utm = CRS::utm(17, true);
    let (e, n) = CoordinateTransform::from_wgs84(&utm)
        .unwrap()
        .transform(-79.38, 43.62)
        .unwrap();

    let mut r = Raster::from_rows(&[
        vec![0.010, f64::NAN, 0.012],
        vec![f64::NAN, 0.020, f64::NAN],
        vec![0.014, f64::NAN, 0.016],
    ])
    .unwrap();
    r.set_transform(GeoTransform::new(e - 45.0, n + 45.0, 30.0, -30.0));
    r.set_crs(Some(utm));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rhow_561.tif");
    write_geotiff(&r, &path, None).unwrap();
    let band: Raster<f64> = read_geotiff(&path).unwrap();

    let mut cache = TransformCache::new();
    let v = sample_lonlat(&band, &mut cache, -79.38, 43.62).unwrap();
    assert_abs_diff_eq!(v.unwrap(), 0.0144, epsilon = 1e-12);

    // A kilometre west: no pixel of the window is on the grid
    let v = sample_lonlat(&band, &mut cache, -79.3924, 43.62).unwrap();
    assert_eq!(v, None);
}

#[test]
fn bloom_and_composite_on_retrieved_scenes() {
    let red = utm_band(&vec![vec![0.01; 2]; 2]);
    let scenes: Vec<Raster<f64>> = [0.005, 0.010, 0.020]
        .iter()
        .map(|&b| blue_red_chla(&utm_band(&vec![vec![b; 2]; 2]), &red).unwrap())
        .collect();

    let mean = cell_statistics(&scenes, CellStatistic::Mean, true).unwrap();
    let expected = (chla_pixel(0.005, 0.01).unwrap()
        + chla_pixel(0.010, 0.01).unwrap()
        + chla_pixel(0.020, 0.01).unwrap())
        / 3.0;
    assert_abs_diff_eq!(mean.get(0, 0).unwrap(), expected, epsilon = 1e-12);

    let params = BloomParams {
        lake_area_km2: Some(0.0036),
        ..BloomParams::default()
    };
    let b = bloom_indicators(&scenes[0], &params).unwrap();
    assert_eq!(b.valid_pixels, 4);
    assert_eq!(b.availability_pct, Some(100.0));
}
