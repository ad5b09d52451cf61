//! Scene identifiers and scene directory discovery
//!
//! ACOLITE names its Level-2 water outputs
//! `<sensor>_<instrument>_<YYYY>_<MM>_<DD>_<hh>_<mm>_<ss>_<path-row>_L2W`,
//! e.g. `L8_OLI_2013_06_22_15_59_31_017030_L2W`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{BatchError, Result};

/// Landsat sensor generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sensor {
    L8,
    L9,
}

impl Sensor {
    /// Tag used in scene identifiers
    pub fn tag(&self) -> &'static str {
        match self {
            Sensor::L8 => "L8",
            Sensor::L9 => "L9",
        }
    }

    /// Sensor of a USGS product id prefix (`LC08`, `LC09`)
    pub fn from_product_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "LC08" | "LO08" => Some(Sensor::L8),
            "LC09" | "LO09" => Some(Sensor::L9),
            _ => None,
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Sensor {
    type Err = SceneNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "L8" => Ok(Sensor::L8),
            "L9" => Ok(Sensor::L9),
            other => Err(SceneNameError::UnknownSensor(other.to_string())),
        }
    }
}

/// Why a directory name is not a usable scene identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneNameError {
    #[error("unknown sensor tag '{0}'")]
    UnknownSensor(String),

    #[error("malformed scene name: {0}")]
    Malformed(String),
}

/// One parsed scene identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scene {
    id: String,
    sensor: Sensor,
    instrument: String,
    acquired: NaiveDateTime,
    path_row: String,
}

impl Scene {
    /// Parse a scene identifier ending with `suffix` (normally `_L2W`).
    pub fn parse(id: &str, suffix: &str) -> std::result::Result<Self, SceneNameError> {
        let malformed = |what: &str| SceneNameError::Malformed(format!("{id}: {what}"));

        let stem = id
            .strip_suffix(suffix)
            .ok_or_else(|| malformed(&format!("missing suffix '{suffix}'")))?;
        let tokens: Vec<&str> = stem.split('_').collect();
        let [sensor, instrument, year, month, day, hour, minute, second, path_row] = tokens[..]
        else {
            return Err(malformed("expected 9 '_'-separated fields before the suffix"));
        };

        let sensor: Sensor = sensor.parse()?;
        if !matches!(instrument, "OLI" | "OLI-2") {
            return Err(malformed(&format!("unknown instrument '{instrument}'")));
        }

        let number = |s: &str, what: &str| -> std::result::Result<u32, SceneNameError> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed(&format!("invalid {what} '{s}'")));
            }
            s.parse().map_err(|_| malformed(&format!("invalid {what} '{s}'")))
        };

        let year = i32::try_from(number(year, "year")?).map_err(|_| malformed("year out of range"))?;
        let acquired = NaiveDate::from_ymd_opt(year, number(month, "month")?, number(day, "day")?)
            .and_then(|d| {
                d.and_hms_opt(
                    number(hour, "hour").ok()?,
                    number(minute, "minute").ok()?,
                    number(second, "second").ok()?,
                )
            })
            .ok_or_else(|| malformed("invalid acquisition date or time"))?;

        if path_row.len() != 6 || !path_row.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(&format!("invalid path/row '{path_row}'")));
        }

        Ok(Self {
            id: id.to_string(),
            sensor,
            instrument: instrument.to_string(),
            acquired,
            path_row: path_row.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn acquired(&self) -> NaiveDateTime {
        self.acquired
    }

    /// WRS-2 path and row, e.g. `017030`
    pub fn path_row(&self) -> &str {
        &self.path_row
    }

    /// Year token, as written in the identifier
    pub fn year_token(&self) -> String {
        self.acquired.format("%Y").to_string()
    }

    /// Month token `01`..`12`
    pub fn month_token(&self) -> String {
        self.acquired.format("%m").to_string()
    }

    /// `<output_root>/<YYYY>/<scene id>.tif`
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        output_root
            .join(self.year_token())
            .join(format!("{}.tif", self.id))
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// All directories below `root` whose name ends with `suffix`, sorted by path.
///
/// The whole tree is visited. Entries that cannot be read are logged and
/// skipped; only a missing or unreadable `root` is an error.
pub fn discover_scene_dirs(root: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(BatchError::RootNotFound(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|e| BatchError::io(root, e))?;

    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(suffix));
        if matches {
            debug!(path = %entry.path().display(), "Discovered scene directory");
            dirs.push(entry.into_path());
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// All `.tif`/`.tiff` files below `root`, sorted by file name then path
pub fn discover_rasters(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(BatchError::RootNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let is_tiff = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
        if entry.file_type().is_file() && is_tiff {
            files.push(entry.into_path());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    Ok(files)
}

/// Final path component as UTF-8, used as the unit identifier
pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_landsat8_id() {
        let s = Scene::parse("L8_OLI_2013_06_22_15_59_31_017030_L2W", "_L2W").unwrap();
        assert_eq!(s.sensor(), Sensor::L8);
        assert_eq!(s.instrument(), "OLI");
        assert_eq!(s.path_row(), "017030");
        assert_eq!(s.acquired().year(), 2013);
        assert_eq!(s.acquired().month(), 6);
        assert_eq!(s.acquired().hour(), 15);
        assert_eq!(s.year_token(), "2013");
        assert_eq!(s.month_token(), "06");
    }

    #[test]
    fn parses_landsat9_oli2() {
        let s = Scene::parse("L9_OLI-2_2022_03_10_16_03_49_018030_L2W", "_L2W").unwrap();
        assert_eq!(s.sensor(), Sensor::L9);
        assert_eq!(s.instrument(), "OLI-2");
    }

    #[test]
    fn output_path_uses_year_directory() {
        let s = Scene::parse("L9_OLI_2021_11_12_15_58_41_017030_L2W", "_L2W").unwrap();
        assert_eq!(
            s.output_path(Path::new("/out")),
            PathBuf::from("/out/2021/L9_OLI_2021_11_12_15_58_41_017030_L2W.tif")
        );
    }

    #[test]
    fn unknown_sensor() {
        let err = Scene::parse("L7_OLI_2013_06_22_15_59_31_017030_L2W", "_L2W").unwrap_err();
        assert_eq!(err, SceneNameError::UnknownSensor("L7".into()));
    }

    #[test]
    fn malformed_names() {
        for id in [
            "L8_OLI_2013_06_22_017030_L2W",
            "L8_OLI_2013_13_22_15_59_31_017030_L2W",
            "L8_OLI_2013_06_22_25_59_31_017030_L2W",
            "L8_ETM_2013_06_22_15_59_31_017030_L2W",
            "L8_OLI_2013_06_22_15_59_31_17030_L2W",
            "L8_OLI_2013_06_22_15_59_31_017030_L1R",
            "L8_OLI_2013_06_22_15_59_31_017030_extra_L2W",
        ] {
            assert!(
                matches!(Scene::parse(id, "_L2W"), Err(SceneNameError::Malformed(_))),
                "{id}"
            );
        }
    }

    #[test]
    fn discovery_walks_whole_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("2013/L8_OLI_2013_06_22_15_59_31_017030_L2W");
        let b = tmp.path().join("deep/er/L9_OLI_2022_03_10_16_03_49_018030_L2W");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::create_dir_all(tmp.path().join("L8_OLI_2013_06_22_15_59_31_017030_L1R")).unwrap();
        std::fs::write(tmp.path().join("notes_L2W"), b"file, not a dir").unwrap();

        let dirs = discover_scene_dirs(tmp.path(), "_L2W").unwrap();
        assert_eq!(dirs, vec![a, b]);
    }

    #[test]
    fn raster_discovery_sorts_by_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("2014")).unwrap();
        std::fs::create_dir_all(tmp.path().join("2013")).unwrap();
        std::fs::write(tmp.path().join("2014/a.tif"), b"").unwrap();
        std::fs::write(tmp.path().join("2013/b.TIF"), b"").unwrap();
        std::fs::write(tmp.path().join("2013/notes.txt"), b"").unwrap();

        let files = discover_rasters(tmp.path()).unwrap();
        assert_eq!(
            files,
            vec![tmp.path().join("2014/a.tif"), tmp.path().join("2013/b.TIF")]
        );
    }

    #[test]
    fn discovery_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            discover_scene_dirs(&missing, "_L2W"),
            Err(BatchError::RootNotFound(_))
        ));
    }
}
