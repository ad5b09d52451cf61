//! Pipeline configuration
//!
//! One explicit value handed to each driver at construction. Every field has
//! a default, so a JSON file only needs the parts it changes:
//!
//! ```json
//! {
//!   "workers": 8,
//!   "transform": { "exclusions": ["L8_OLI_2013_06_22_15_59_31_017030_L2W"] },
//!   "bloom": { "lake_area_km2": 600.9387, "pixel_area_km2": 0.0009 }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use limnosat_algorithms::statistics::{BloomParams, CellStatistic};
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};
use crate::scene::Sensor;

/// Canonical water-leaving reflectance bands extracted at match-ups
pub const DEFAULT_BANDS: [&str; 5] = ["rhow_443", "rhow_483", "rhow_561", "rhow_655", "rhow_865"];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Band key -> file name table shared by all drivers
    pub bands: BandCatalog,
    /// Name suffix marking Level-2 water scene directories
    pub scene_suffix: String,
    /// Fixed worker pool size; all cores when unset
    pub workers: Option<usize>,
    pub transform: TransformConfig,
    pub extraction: ExtractionConfig,
    pub bloom: BloomParams,
    pub composite: CompositeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bands: BandCatalog::default(),
            scene_suffix: "_L2W".to_string(),
            workers: None,
            transform: TransformConfig::default(),
            extraction: ExtractionConfig::default(),
            bloom: BloomParams::default(),
            composite: CompositeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BatchError::io(path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        if self.scene_suffix.is_empty() {
            return Err(BatchError::Config("scene_suffix must not be empty".into()));
        }
        if self.workers == Some(0) {
            return Err(BatchError::Config("workers must be at least 1".into()));
        }
        for key in [&self.transform.retrieval.blue, &self.transform.retrieval.red]
            .into_iter()
            .chain(&self.extraction.bands)
        {
            if !self.bands.files.contains_key(key) {
                return Err(BatchError::Config(format!(
                    "band '{key}' is not in the band catalog"
                )));
            }
        }
        if self.composite.statistics.is_empty() {
            return Err(BatchError::Config(
                "composite.statistics must name at least one statistic".into(),
            ));
        }
        Ok(())
    }
}

/// Canonical band key -> file name, with per-sensor overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandCatalog {
    pub files: BTreeMap<String, String>,
    /// Sensor tag (`L8`, `L9`) -> band key -> file name
    pub overrides: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for BandCatalog {
    fn default() -> Self {
        let files = DEFAULT_BANDS
            .iter()
            .map(|key| (key.to_string(), format!("{key}.tif")))
            .collect();

        // OLI-2 centre wavelengths differ by one nanometre in two bands
        let l9 = BTreeMap::from([
            ("rhow_483".to_string(), "rhow_482.tif".to_string()),
            ("rhow_655".to_string(), "rhow_654.tif".to_string()),
        ]);

        Self {
            files,
            overrides: BTreeMap::from([(Sensor::L9.tag().to_string(), l9)]),
        }
    }
}

impl BandCatalog {
    /// File name holding band `key` for `sensor`
    pub fn file_name(&self, sensor: Sensor, key: &str) -> Option<&str> {
        self.overrides
            .get(sensor.tag())
            .and_then(|o| o.get(key))
            .or_else(|| self.files.get(key))
            .map(String::as_str)
    }
}

/// Band keys feeding the blue/red retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalBands {
    pub blue: String,
    pub red: String,
}

impl Default for RetrievalBands {
    fn default() -> Self {
        Self {
            blue: "rhow_483".to_string(),
            red: "rhow_655".to_string(),
        }
    }
}

/// Settings of the batch transform engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub retrieval: RetrievalBands,
    /// Scene identifiers skipped before any file is touched
    pub exclusions: BTreeSet<String>,
    /// Write 32-bit float outputs instead of 64-bit
    pub float32_output: bool,
}

/// What to do when several directories match one match-up record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Leave the record empty and report the candidates
    #[default]
    Reject,
    /// Use the lexicographically smallest candidate path
    FirstSorted,
}

impl fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AmbiguityPolicy::Reject => "reject",
            AmbiguityPolicy::FirstSorted => "first-sorted",
        })
    }
}

impl FromStr for AmbiguityPolicy {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reject" => Ok(AmbiguityPolicy::Reject),
            "first-sorted" => Ok(AmbiguityPolicy::FirstSorted),
            other => Err(BatchError::Config(format!(
                "unknown ambiguity policy '{other}' (expected reject or first-sorted)"
            ))),
        }
    }
}

/// Settings of the match-up extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub image_column: String,
    pub longitude_column: String,
    pub latitude_column: String,
    /// Band keys sampled per record, in output column order
    pub bands: Vec<String>,
    pub ambiguity: AmbiguityPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            image_column: "Image".to_string(),
            longitude_column: "Longitude_DD".to_string(),
            latitude_column: "Latitude_DD".to_string(),
            bands: DEFAULT_BANDS.iter().map(|b| b.to_string()).collect(),
            ambiguity: AmbiguityPolicy::default(),
        }
    }
}

/// Grouping of scenes into composites
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// Calendar month across all years (`01`..`12`)
    #[default]
    Month,
    Year,
}

impl FromStr for GroupBy {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "month" => Ok(GroupBy::Month),
            "year" => Ok(GroupBy::Year),
            other => Err(BatchError::Config(format!(
                "unknown grouping '{other}' (expected month or year)"
            ))),
        }
    }
}

/// Settings of the composite driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub group_by: GroupBy,
    pub statistics: Vec<CellStatistic>,
    /// Set zero-valued output pixels to nodata
    pub zero_as_nodata: bool,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            group_by: GroupBy::Month,
            statistics: vec![CellStatistic::Mean, CellStatistic::Max, CellStatistic::Std],
            zero_as_nodata: true,
        }
    }
}
