//! Per-run accounting of produced outputs and omitted units

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info};

use crate::scene::SceneNameError;

/// Why a unit of work (scene, record, band, file) produced nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OmissionReason {
    /// Scene is in the configured exclusion set
    Excluded,
    /// A required band file does not exist
    MissingBand { band: String, path: PathBuf },
    /// Sensor tag is neither L8 nor L9
    UnknownSensor { tag: String },
    /// Name does not follow the scene or product naming convention
    MalformedName { detail: String },
    /// Several scene directories carry the same identifier
    DuplicateScene { paths: Vec<PathBuf> },
    /// No scene directory matches the record's image name
    NoMatchingDirectory { pattern: String },
    /// Several scene directories match the record's image name
    AmbiguousDirectory { candidates: Vec<PathBuf> },
    /// Longitude or latitude missing or not a number
    InvalidCoordinate { detail: String },
    /// No valid pixel in the sampling window
    NoValidPixels,
    /// Unexpected failure while processing the unit
    Failed { detail: String },
}

impl OmissionReason {
    /// Whether this omission is an expected consequence of incomplete data
    pub fn is_expected(&self) -> bool {
        !matches!(self, OmissionReason::Failed { .. })
    }

    /// Short machine-friendly name
    pub fn kind(&self) -> &'static str {
        match self {
            OmissionReason::Excluded => "excluded",
            OmissionReason::MissingBand { .. } => "missing_band",
            OmissionReason::UnknownSensor { .. } => "unknown_sensor",
            OmissionReason::MalformedName { .. } => "malformed_name",
            OmissionReason::DuplicateScene { .. } => "duplicate_scene",
            OmissionReason::NoMatchingDirectory { .. } => "no_matching_directory",
            OmissionReason::AmbiguousDirectory { .. } => "ambiguous_directory",
            OmissionReason::InvalidCoordinate { .. } => "invalid_coordinate",
            OmissionReason::NoValidPixels => "no_valid_pixels",
            OmissionReason::Failed { .. } => "failed",
        }
    }

    pub(crate) fn failed(detail: impl fmt::Display) -> Self {
        OmissionReason::Failed {
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for OmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmissionReason::Excluded => write!(f, "in exclusion list"),
            OmissionReason::MissingBand { band, path } => {
                write!(f, "missing band {band} ({})", path.display())
            }
            OmissionReason::UnknownSensor { tag } => write!(f, "unknown sensor '{tag}'"),
            OmissionReason::MalformedName { detail } => write!(f, "{detail}"),
            OmissionReason::DuplicateScene { paths } => {
                write!(f, "scene found in {} directories", paths.len())
            }
            OmissionReason::NoMatchingDirectory { pattern } => {
                write!(f, "no directory matches {pattern}")
            }
            OmissionReason::AmbiguousDirectory { candidates } => {
                write!(f, "{} directories match: ", candidates.len())?;
                let names: Vec<String> =
                    candidates.iter().map(|p| p.display().to_string()).collect();
                write!(f, "{}", names.join(", "))
            }
            OmissionReason::InvalidCoordinate { detail } => write!(f, "invalid coordinate: {detail}"),
            OmissionReason::NoValidPixels => write!(f, "no valid pixel in window"),
            OmissionReason::Failed { detail } => write!(f, "{detail}"),
        }
    }
}

impl From<SceneNameError> for OmissionReason {
    fn from(e: SceneNameError) -> Self {
        match e {
            SceneNameError::UnknownSensor(tag) => OmissionReason::UnknownSensor { tag },
            SceneNameError::Malformed(detail) => OmissionReason::MalformedName { detail },
        }
    }
}

/// One omitted unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omission {
    pub unit: String,
    pub reason: OmissionReason,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Identifiers of the units that produced output (file paths for
    /// raster drivers, record labels for the match-up extraction)
    pub produced: Vec<String>,
    pub omissions: Vec<Omission>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a produced unit
    pub fn record_output(&mut self, unit: impl Into<String>) {
        let unit = unit.into();
        info!(unit = %unit, "Produced");
        self.produced.push(unit);
    }

    /// Record and log an omission: expected reasons at info, failures at error
    pub fn omit(&mut self, unit: impl Into<String>, reason: OmissionReason) {
        let unit = unit.into();
        if reason.is_expected() {
            info!(unit = %unit, reason = reason.kind(), "Omitted: {reason}");
        } else {
            error!(unit = %unit, reason = reason.kind(), "Omitted: {reason}");
        }
        self.omissions.push(Omission { unit, reason });
    }

    /// Omissions of a given kind
    pub fn omissions_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Omission> + 'a {
        self.omissions.iter().filter(move |o| o.reason.kind() == kind)
    }

    /// Number of unexpected failures
    pub fn failures(&self) -> usize {
        self.omissions.iter().filter(|o| !o.reason.is_expected()).count()
    }

    /// Append another report's entries
    pub fn merge(&mut self, other: BatchReport) {
        self.produced.extend(other.produced);
        self.omissions.extend(other.omissions);
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} produced, {} omitted ({} failed)",
            self.produced.len(),
            self.omissions.len(),
            self.failures()
        )
    }
}
