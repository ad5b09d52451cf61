//! Match-up extraction
//!
//! Each record of an in-situ table names a Landsat product
//! (`LC08_L2SP_017030_20130622_...`) and a WGS84 position. The product name
//! is turned into a scene directory pattern, the directory is looked up in an
//! index built once per run, and every configured band is sampled with a 3x3
//! window mean. Values that cannot be obtained stay empty; the record's other
//! columns are kept as read.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use glob::Pattern;
use limnosat_algorithms::sampling::sample_lonlat;
use limnosat_core::io::read_geotiff;
use limnosat_core::{Raster, TransformCache};
use limnosat_parallel::{map_isolated, ProcessingMode};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{AmbiguityPolicy, BandCatalog, ExtractionConfig, PipelineConfig};
use crate::error::{BatchError, Result};
use crate::report::{BatchReport, OmissionReason};
use crate::scene::Sensor;

/// A CSV table kept as text, column order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchupTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MatchupTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        Self { headers, rows }
    }

    /// Read a CSV file with a header row
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| BatchError::io(path, e))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self::new(headers, rows))
    }

    /// Write as CSV, creating parent directories
    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BatchError::io(parent, e))?;
        }
        let file = std::fs::File::create(path).map_err(|e| BatchError::io(path, e))?;
        self.to_writer(file)
    }

    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|e| BatchError::Csv(e.into()))?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact header name
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Cell by column name
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        self.get(row, self.column(column)?)
    }

    fn set(&mut self, row: usize, col: usize, value: String) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value;
        }
    }

    /// Column index for `name`, appended at the end when absent.
    /// Existing cells of the column are cleared.
    fn reset_column(&mut self, name: &str) -> usize {
        let col = match self.column(name) {
            Some(col) => col,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        for row in &mut self.rows {
            row[col].clear();
        }
        col
    }
}

/// Directory name patterns derived from a product name
#[derive(Debug, Clone)]
pub struct ScenePattern {
    sensor: Sensor,
    patterns: Vec<Pattern>,
}

impl ScenePattern {
    /// Patterns for `<sensor>_OLI[-2]_<YYYY>_<MM>_<DD>_*_<path-row><suffix>`
    /// from a product name `LC0x_<level>_<path-row>_<YYYYMMDD>_...`.
    pub fn from_product(image: &str, suffix: &str) -> std::result::Result<Self, OmissionReason> {
        let malformed = |detail: String| OmissionReason::MalformedName { detail };

        let parts: Vec<&str> = image.trim().split('_').collect();
        if parts.len() < 4 {
            return Err(malformed(format!("product name '{image}' has fewer than 4 fields")));
        }
        let sensor = Sensor::from_product_prefix(parts[0]).ok_or_else(|| {
            OmissionReason::UnknownSensor {
                tag: parts[0].to_string(),
            }
        })?;
        let path_row = parts[2];
        if path_row.len() != 6 || !path_row.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(format!("invalid path/row '{path_row}' in '{image}'")));
        }
        let date = NaiveDate::parse_from_str(parts[3], "%Y%m%d")
            .map_err(|e| malformed(format!("invalid date '{}' in '{image}': {e}", parts[3])))?;

        let patterns = ["OLI", "OLI-2"]
            .iter()
            .map(|instrument| {
                let text = format!(
                    "{}_{}_{}_*_{}{}",
                    sensor.tag(),
                    instrument,
                    date.format("%Y_%m_%d"),
                    path_row,
                    Pattern::escape(suffix)
                );
                Pattern::new(&text).map_err(|e| malformed(format!("{text}: {e}")))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { sensor, patterns })
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    /// Whether a directory name matches any of the patterns
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

impl std::fmt::Display for ScenePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let texts: Vec<&str> = self.patterns.iter().map(Pattern::as_str).collect();
        f.write_str(&texts.join(" | "))
    }
}

/// Every directory below a root, indexed by name, sorted by path
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    dirs: Vec<(String, PathBuf)>,
}

impl DirectoryIndex {
    pub fn build(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(BatchError::RootNotFound(root.to_path_buf()));
        }

        let mut dirs = Vec::new();
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                dirs.push((name, entry.into_path()));
            }
        }
        dirs.sort_by(|a, b| a.1.cmp(&b.1));

        debug!(root = %root.display(), directories = dirs.len(), "Indexed scene tree");
        Ok(Self { dirs })
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Directories whose name matches, in path order
    pub fn candidates(&self, pattern: &ScenePattern) -> Vec<&Path> {
        self.dirs
            .iter()
            .filter(|(name, _)| pattern.matches(name))
            .map(|(_, path)| path.as_path())
            .collect()
    }

    /// The single directory for `pattern` under `policy`
    pub fn resolve(
        &self,
        pattern: &ScenePattern,
        policy: AmbiguityPolicy,
    ) -> std::result::Result<&Path, OmissionReason> {
        let candidates = self.candidates(pattern);
        match (candidates.as_slice(), policy) {
            ([], _) => Err(OmissionReason::NoMatchingDirectory {
                pattern: pattern.to_string(),
            }),
            ([only], _) => Ok(*only),
            ([first, ..], AmbiguityPolicy::FirstSorted) => {
                debug!(
                    chosen = %first.display(),
                    candidates = candidates.len(),
                    "Ambiguous match, using first sorted"
                );
                Ok(*first)
            }
            (_, AmbiguityPolicy::Reject) => Err(OmissionReason::AmbiguousDirectory {
                candidates: candidates.iter().map(|p| p.to_path_buf()).collect(),
            }),
        }
    }
}

/// Measurement columns of one record; each is written at most once
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    values: Vec<Option<f64>>,
    written: Vec<bool>,
}

impl Measurements {
    pub fn new(columns: usize) -> Self {
        Self {
            values: vec![None; columns],
            written: vec![false; columns],
        }
    }

    /// Store `value` in `column`; returns `false` if it was already written
    pub fn set(&mut self, column: usize, value: Option<f64>) -> bool {
        match self.written.get_mut(column) {
            Some(written) if !*written => {
                *written = true;
                self.values[column] = value;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, column: usize) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }

    pub fn any(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }
}

/// What one record produced
#[derive(Debug, Clone)]
struct RecordOutcome {
    label: String,
    values: Measurements,
    omissions: Vec<(String, OmissionReason)>,
}

/// Samples configured bands at every match-up record
#[derive(Debug, Clone)]
pub struct MatchupExtractor {
    catalog: BandCatalog,
    extraction: ExtractionConfig,
    scene_suffix: String,
    index: DirectoryIndex,
    mode: ProcessingMode,
}

impl MatchupExtractor {
    /// Index `scene_root` and prepare the extraction
    pub fn new(config: &PipelineConfig, scene_root: &Path) -> Result<Self> {
        let index = DirectoryIndex::build(scene_root)?;
        Ok(Self {
            catalog: config.bands.clone(),
            extraction: config.extraction.clone(),
            scene_suffix: config.scene_suffix.clone(),
            index,
            mode: ProcessingMode::from_workers(config.workers),
        })
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.extraction.ambiguity = policy;
        self
    }

    /// Extract all records of `table`.
    ///
    /// Returns a copy of the table with one column per configured band
    /// (appended in configured order, or reset in place when the column
    /// already exists) and the report of what could not be filled.
    pub fn run(&self, table: &MatchupTable) -> Result<(MatchupTable, BatchReport)> {
        let ex = &self.extraction;
        let image_col = table
            .column(&ex.image_column)
            .ok_or_else(|| BatchError::MissingColumn(ex.image_column.clone()))?;
        let lon_col = table
            .column(&ex.longitude_column)
            .ok_or_else(|| BatchError::MissingColumn(ex.longitude_column.clone()))?;
        let lat_col = table
            .column(&ex.latitude_column)
            .ok_or_else(|| BatchError::MissingColumn(ex.latitude_column.clone()))?;

        info!(
            records = table.len(),
            bands = ex.bands.len(),
            directories = self.index.len(),
            policy = %ex.ambiguity,
            "Starting match-up extraction"
        );

        let mut output = table.clone();
        let band_cols: Vec<usize> = ex.bands.iter().map(|b| output.reset_column(b)).collect();

        let rows: Vec<usize> = (0..table.len()).collect();
        let outcomes = map_isolated(&self.mode, &rows, |&row| {
            self.extract_record(table, row, image_col, lon_col, lat_col)
        })?;

        let mut report = BatchReport::new();
        for (&row, outcome) in rows.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    for (i, &col) in band_cols.iter().enumerate() {
                        if let Some(v) = outcome.values.get(i) {
                            output.set(row, col, v.to_string());
                        }
                    }
                    for (unit, reason) in outcome.omissions {
                        report.omit(unit, reason);
                    }
                    if outcome.values.any() {
                        report.record_output(outcome.label);
                    }
                }
                Err(panicked) => report.omit(
                    record_label(row, table.get(row, image_col)),
                    OmissionReason::failed(panicked),
                ),
            }
        }

        info!(summary = %report, "Match-up extraction finished");
        Ok((output, report))
    }

    fn extract_record(
        &self,
        table: &MatchupTable,
        row: usize,
        image_col: usize,
        lon_col: usize,
        lat_col: usize,
    ) -> RecordOutcome {
        let image = table.get(row, image_col).unwrap_or_default().trim();
        let mut outcome = RecordOutcome {
            label: record_label(row, Some(image)),
            values: Measurements::new(self.extraction.bands.len()),
            omissions: Vec::new(),
        };

        let coords = parse_coordinate(table.get(row, lon_col), -180.0..=180.0, "longitude")
            .and_then(|lon| {
                parse_coordinate(table.get(row, lat_col), -90.0..=90.0, "latitude").map(|lat| (lon, lat))
            });
        let (lon, lat) = match coords {
            Ok(c) => c,
            Err(reason) => {
                outcome.omissions.push((outcome.label.clone(), reason));
                return outcome;
            }
        };

        let located = ScenePattern::from_product(image, &self.scene_suffix).and_then(|pattern| {
            self.index
                .resolve(&pattern, self.extraction.ambiguity)
                .map(|dir| (pattern.sensor(), dir))
        });
        let (sensor, dir) = match located {
            Ok(found) => found,
            Err(reason) => {
                outcome.omissions.push((outcome.label.clone(), reason));
                return outcome;
            }
        };

        // Pipelines are built per record and per distinct raster CRS
        let mut cache = TransformCache::new();

        for (i, key) in self.extraction.bands.iter().enumerate() {
            let unit = format!("{} {key}", outcome.label);
            let Some(name) = self.catalog.file_name(sensor, key) else {
                outcome.omissions.push((
                    unit,
                    OmissionReason::failed(format!("band '{key}' has no file name for {sensor}")),
                ));
                continue;
            };

            let path = dir.join(name);
            if !path.is_file() {
                outcome.omissions.push((
                    unit,
                    OmissionReason::MissingBand {
                        band: key.clone(),
                        path,
                    },
                ));
                continue;
            }

            match sample_band(&path, &mut cache, lon, lat) {
                Ok(Some(v)) => {
                    if !outcome.values.set(i, Some(v)) {
                        warn!(unit = %unit, "Measurement already set, keeping first value");
                    }
                }
                Ok(None) => outcome.omissions.push((unit, OmissionReason::NoValidPixels)),
                Err(e) => outcome.omissions.push((unit, OmissionReason::failed(e))),
            }
        }

        outcome
    }
}

fn record_label(row: usize, image: Option<&str>) -> String {
    match image.map(str::trim).filter(|s| !s.is_empty()) {
        Some(image) => format!("record {} ({image})", row + 1),
        None => format!("record {}", row + 1),
    }
}

fn parse_coordinate(
    cell: Option<&str>,
    range: std::ops::RangeInclusive<f64>,
    what: &str,
) -> std::result::Result<f64, OmissionReason> {
    let text = cell.map(str::trim).unwrap_or_default();
    let invalid = |detail: String| OmissionReason::InvalidCoordinate { detail };
    if text.is_empty() {
        return Err(invalid(format!("{what} is empty")));
    }
    let value: f64 = text
        .parse()
        .map_err(|_| invalid(format!("{what} '{text}' is not a number")))?;
    if !value.is_finite() || !range.contains(&value) {
        return Err(invalid(format!("{what} {value} out of range")));
    }
    Ok(value)
}

fn sample_band(
    path: &Path,
    cache: &mut TransformCache,
    lon: f64,
    lat: f64,
) -> limnosat_core::Result<Option<f64>> {
    let raster: Raster<f64> = read_geotiff(path)?;
    sample_lonlat(&raster, cache, lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(root: &Path, names: &[&str]) -> DirectoryIndex {
        for name in names {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
        DirectoryIndex::build(root).unwrap()
    }

    #[test]
    fn product_name_to_pattern() {
        let p = ScenePattern::from_product("LC08_L2SP_017030_20130622_20200912_02_T1", "_L2W").unwrap();
        assert_eq!(p.sensor(), Sensor::L8);
        assert!(p.matches("L8_OLI_2013_06_22_15_59_31_017030_L2W"));
        assert!(!p.matches("L8_OLI_2013_06_22_15_59_31_018030_L2W"));
        assert!(!p.matches("L8_OLI_2013_06_23_15_59_31_017030_L2W"));
        assert!(!p.matches("L9_OLI_2013_06_22_15_59_31_017030_L2W"));

        let p = ScenePattern::from_product("LC09_L1TP_018030_20220310_x", "_L2W").unwrap();
        assert!(p.matches("L9_OLI_2022_03_10_16_03_49_018030_L2W"));
        assert!(p.matches("L9_OLI-2_2022_03_10_16_03_49_018030_L2W"));
    }

    #[test]
    fn bad_product_names() {
        assert_eq!(
            ScenePattern::from_product("LE07_L1TP_017030_20130622", "_L2W").unwrap_err(),
            OmissionReason::UnknownSensor { tag: "LE07".into() }
        );
        assert!(matches!(
            ScenePattern::from_product("LC08_L1TP_017030_20131322", "_L2W"),
            Err(OmissionReason::MalformedName { .. })
        ));
        assert!(matches!(
            ScenePattern::from_product("LC08_017030", "_L2W"),
            Err(OmissionReason::MalformedName { .. })
        ));
    }

    #[test]
    fn resolve_policies() {
        let tmp = tempfile::tempdir().unwrap();
        let idx = index(
            tmp.path(),
            &[
                "b/L8_OLI_2013_06_22_15_59_31_017030_L2W",
                "a/L8_OLI_2013_06_22_16_00_02_017030_L2W",
                "c/L8_OLI_2014_01_01_15_59_31_017030_L2W",
            ],
        );
        let p = ScenePattern::from_product("LC08_L1TP_017030_20130622", "_L2W").unwrap();

        match idx.resolve(&p, AmbiguityPolicy::Reject) {
            Err(OmissionReason::AmbiguousDirectory { candidates }) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }

        let chosen = idx.resolve(&p, AmbiguityPolicy::FirstSorted).unwrap();
        assert_eq!(chosen, tmp.path().join("a/L8_OLI_2013_06_22_16_00_02_017030_L2W"));

        let p = ScenePattern::from_product("LC08_L1TP_017030_20140101", "_L2W").unwrap();
        assert!(idx.resolve(&p, AmbiguityPolicy::Reject).is_ok());

        let p = ScenePattern::from_product("LC08_L1TP_017030_20150101", "_L2W").unwrap();
        assert!(matches!(
            idx.resolve(&p, AmbiguityPolicy::Reject),
            Err(OmissionReason::NoMatchingDirectory { .. })
        ));
    }

    #[test]
    fn measurements_are_set_once() {
        let mut m = Measurements::new(2);
        assert!(m.set(0, Some(1.5)));
        assert!(!m.set(0, Some(2.5)));
        assert!(!m.set(5, Some(1.0)));
        assert_eq!(m.get(0), Some(1.5));
        assert_eq!(m.get(1), None);
        assert!(m.any());
    }

    #[test]
    fn table_roundtrip_keeps_columns() {
        let csv = "Station,Image,Longitude_DD,Latitude_DD,rhow_561\nHH1,LC08_x,-79.8,43.3,0.5\n";
        let mut t = MatchupTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(t.value(0, "Station"), Some("HH1"));

        let existing = t.reset_column("rhow_561");
        let appended = t.reset_column("rhow_443");
        assert_eq!(existing, 4);
        assert_eq!(appended, 5);
        assert_eq!(t.value(0, "rhow_561"), Some(""));

        let mut buf = Vec::new();
        t.to_writer(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Station,Image,Longitude_DD,Latitude_DD,rhow_561,rhow_443\nHH1,LC08_x,-79.8,43.3,,\n"
        );
    }

    #[test]
    fn coordinates_are_validated() {
        assert_eq!(parse_coordinate(Some(" -79.5 "), -180.0..=180.0, "longitude"), Ok(-79.5));
        assert!(parse_coordinate(Some(""), -180.0..=180.0, "longitude").is_err());
        assert!(parse_coordinate(None, -180.0..=180.0, "longitude").is_err());
        assert!(parse_coordinate(Some("abc"), -90.0..=90.0, "latitude").is_err());
        assert!(parse_coordinate(Some("91"), -90.0..=90.0, "latitude").is_err());
        assert!(parse_coordinate(Some("NaN"), -90.0..=90.0, "latitude").is_err());
    }

    #[test]
    fn missing_columns_fail_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let extractor = MatchupExtractor::new(&PipelineConfig::default(), tmp.path()).unwrap();
        let table = MatchupTable::new(vec!["Image".into(), "Longitude_DD".into()], vec![]);
        assert!(matches!(
            extractor.run(&table),
            Err(BatchError::MissingColumn(ref c)) if c == "Latitude_DD"
        ));
    }
}
