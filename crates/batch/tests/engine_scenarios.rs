//! Batch transform scenarios over scene trees built in a temp directory.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use limnosat_algorithms::imagery::chla_pixel;
use limnosat_batch::{OmissionReason, PipelineConfig, TransformEngine};
use limnosat_core::io::{read_geotiff, write_geotiff};
use limnosat_core::{GeoTransform, Raster, CRS};
use limnosat_parallel::ProcessingMode;

const EXCLUDED: &str = "L8_OLI_2013_06_22_15_59_31_017030_L2W";
const NO_RED: &str = "L8_OLI_2014_05_08_15_57_13_017030_L2W";
const GOOD: &str = "L9_OLI_2022_03_10_16_03_49_018030_L2W";

fn band(value: f64) -> Raster<f64> {
    let mut r = Raster::filled(3, 3, value);
    r.set_transform(GeoTransform::new(630_000.0, 4_830_000.0, 30.0, -30.0));
    r.set_crs(Some(CRS::utm(17, true)));
    r
}

fn write_band(dir: &Path, name: &str, value: f64) {
    write_geotiff(&band(value), dir.join(name), None).unwrap();
}

/// Three scenes: one excluded, one without its red band, one complete
fn three_scene_tree(root: &Path) {
    let excluded = root.join("2013").join(EXCLUDED);
    write_band(&excluded, "rhow_483.tif", 0.02);
    write_band(&excluded, "rhow_655.tif", 0.01);

    let no_red = root.join("2014").join(NO_RED);
    write_band(&no_red, "rhow_483.tif", 0.02);

    let good = root.join("2022").join(GOOD);
    write_band(&good, "rhow_482.tif", 0.02);
    write_band(&good, "rhow_654.tif", 0.01);
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn excluded_and_incomplete_scenes_are_omitted() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("acolite");
    let output = tmp.path().join("chla");
    three_scene_tree(&input);

    let mut config = PipelineConfig::default();
    config.transform.exclusions.insert(EXCLUDED.to_string());
    let engine = TransformEngine::new(&config).with_mode(ProcessingMode::Sequential);

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let report = tracing::subscriber::with_default(subscriber, || engine.run(&input, &output)).unwrap();

    // exactly one output raster
    let expected = output.join("2022").join(format!("{GOOD}.tif"));
    assert_eq!(report.produced, vec![expected.display().to_string()]);
    assert!(expected.is_file());
    assert!(!output.join("2013").exists());
    assert!(!output.join("2014").exists());

    // exactly two omissions with their reasons
    assert_eq!(report.omissions.len(), 2);
    let excluded = report.omissions.iter().find(|o| o.unit == EXCLUDED).unwrap();
    assert_eq!(excluded.reason, OmissionReason::Excluded);
    let no_red = report.omissions.iter().find(|o| o.unit == NO_RED).unwrap();
    assert!(matches!(
        &no_red.reason,
        OmissionReason::MissingBand { band, path } if band == "rhow_655" && path.ends_with("rhow_655.tif")
    ));
    assert_eq!(report.failures(), 0);

    let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let omitted: Vec<&str> = text.lines().filter(|l| l.contains("Omitted")).collect();
    assert_eq!(omitted.len(), 2, "{text}");
    assert!(omitted.iter().any(|l| l.contains(EXCLUDED) && l.contains("excluded")));
    assert!(omitted.iter().any(|l| l.contains(NO_RED) && l.contains("missing_band")));

    let out: Raster<f64> = read_geotiff(&expected).unwrap();
    assert_eq!(out.get(1, 1).unwrap(), chla_pixel(0.02, 0.01).unwrap());
    assert_eq!(out.crs().and_then(CRS::epsg), Some(32617));
}

#[test]
fn corrupt_scene_does_not_stop_the_pool() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("acolite");
    let output = tmp.path().join("chla");

    let ids: Vec<String> = (1..=8)
        .map(|d| format!("L8_OLI_2015_03_{d:02}_15_57_13_017030_L2W"))
        .collect();
    for (i, id) in ids.iter().enumerate() {
        let dir = input.join(id);
        write_band(&dir, "rhow_483.tif", 0.02);
        if i == 3 {
            std::fs::write(dir.join("rhow_655.tif"), b"II*\0 truncated").unwrap();
        } else {
            write_band(&dir, "rhow_655.tif", 0.01);
        }
    }

    let engine =
        TransformEngine::new(&PipelineConfig::default()).with_mode(ProcessingMode::ParallelWith(3));
    let report = engine.run(&input, &output).unwrap();

    assert_eq!(report.produced.len(), 7);
    assert_eq!(report.omissions.len(), 1);
    assert_eq!(report.omissions[0].unit, ids[3]);
    assert!(matches!(report.omissions[0].reason, OmissionReason::Failed { .. }));
    assert!(!output.join("2015").join(format!("{}.tif", ids[3])).exists());

    // nothing but finished rasters in the output tree
    let leftovers: Vec<_> = std::fs::read_dir(output.join("2015"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.ends_with("_L2W.tif"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn missing_input_root_is_a_framing_error() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = TransformEngine::new(&PipelineConfig::default());
    assert!(engine
        .run(&tmp.path().join("missing"), &tmp.path().join("out"))
        .is_err());
}
