//! Bloom indicator table over a directory of chlorophyll-a rasters

use std::path::Path;

use limnosat_algorithms::statistics::{bloom_indicators, BloomParams};
use limnosat_core::io::read_geotiff;
use limnosat_core::Raster;
use limnosat_parallel::{map_isolated, ProcessingMode};
use serde::Serialize;
use tracing::info;

use crate::error::{BatchError, Result};
use crate::report::{BatchReport, OmissionReason};
use crate::scene::{dir_name, discover_rasters};

/// One CSV row of the bloom table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloomRow {
    #[serde(rename = "File_Name")]
    pub file_name: String,
    #[serde(rename = "Bloom_Intensity_ugL")]
    pub intensity_ugl: Option<f64>,
    #[serde(rename = "Bloom_Extent_km2")]
    pub extent_km2: f64,
    #[serde(rename = "Bloom_Severity_ugkm2L")]
    pub severity: Option<f64>,
    #[serde(rename = "Data_Availability_pct")]
    pub availability_pct: Option<f64>,
}

/// Compute bloom indicators for every raster below `dir`.
///
/// Rows come out sorted by file name. Files that cannot be read are omitted.
pub fn bloom_batch(
    dir: &Path,
    params: &BloomParams,
    mode: ProcessingMode,
) -> Result<(Vec<BloomRow>, BatchReport)> {
    params.validate()?;
    let files = discover_rasters(dir)?;
    info!(root = %dir.display(), files = files.len(), "Computing bloom indicators");

    let outcomes = map_isolated(&mode, &files, |path| bloom_row(path, params))?;

    let mut rows = Vec::with_capacity(files.len());
    let mut report = BatchReport::new();
    for (path, outcome) in files.iter().zip(outcomes) {
        match outcome {
            Ok(Ok(row)) => {
                report.record_output(path.display().to_string());
                rows.push(row);
            }
            Ok(Err(e)) => report.omit(dir_name(path), OmissionReason::failed(e)),
            Err(panicked) => report.omit(dir_name(path), OmissionReason::failed(panicked)),
        }
    }

    info!(summary = %report, "Bloom indicators finished");
    Ok((rows, report))
}

fn bloom_row(path: &Path, params: &BloomParams) -> limnosat_core::Result<BloomRow> {
    let chla: Raster<f64> = read_geotiff(path)?;
    let b = bloom_indicators(&chla, params)?;
    Ok(BloomRow {
        file_name: dir_name(path),
        intensity_ugl: b.intensity_ugl,
        extent_km2: b.extent_km2,
        severity: b.severity,
        availability_pct: b.availability_pct,
    })
}

/// Write bloom rows as CSV with the header row
pub fn write_bloom_csv(path: &Path, rows: &[BloomRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BatchError::io(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record([
            "File_Name",
            "Bloom_Intensity_ugL",
            "Bloom_Extent_km2",
            "Bloom_Severity_ugkm2L",
            "Data_Availability_pct",
        ])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| BatchError::io(path, e))?;
    Ok(())
}
