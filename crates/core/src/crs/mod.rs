//! Coordinate reference systems and reprojection

mod transform;

pub use transform::{CoordinateTransform, TransformCache};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code of WGS84 geographic coordinates (longitude, latitude in degrees)
pub const WGS84_EPSG: u32 = 4326;

/// Coordinate reference system, identified by an EPSG code or a PROJ string.
///
/// Rasters read from GeoTIFF carry the EPSG code found in their GeoKey
/// directory. A PROJ string takes precedence over the EPSG code when both are
/// present, which allows custom definitions in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: Option<u32>,
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(WGS84_EPSG)
    }

    /// UTM zone on WGS84, e.g. `utm(17, true)` is EPSG:32617
    pub fn utm(zone: u32, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone)
    }

    /// EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Explicit PROJ string if one was given
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Resolve the PROJ definition used to build a transformation pipeline.
    pub fn proj_definition(&self) -> Result<String> {
        if let Some(proj) = &self.proj {
            return Ok(proj.clone());
        }
        let code = self
            .epsg
            .ok_or_else(|| Error::UnsupportedCrs("CRS has neither EPSG code nor PROJ string".into()))?;
        u16::try_from(code)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4.to_string())
            .ok_or_else(|| Error::UnsupportedCrs(format!("EPSG:{code} is not in the CRS database")))
    }

    /// Whether coordinates in this CRS are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        match self.proj_definition() {
            Ok(def) => def.contains("+proj=longlat") || def.contains("+proj=latlong"),
            Err(_) => matches!(self.epsg, Some(code) if (4000..5000).contains(&code)),
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a.trim() == b.trim();
        }
        false
    }

    /// Short identifier, used in logs and as a cache key
    pub fn identifier(&self) -> String {
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(32617);
        assert_eq!(crs.epsg(), Some(32617));
        assert_eq!(crs.identifier(), "EPSG:32617");
        assert_eq!(CRS::utm(17, true), crs);
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::wgs84().is_equivalent(&CRS::utm(17, true)));
    }

    #[test]
    fn test_geographic_detection() {
        assert!(CRS::wgs84().is_geographic());
        assert!(!CRS::utm(17, true).is_geographic());
        assert!(CRS::from_proj("+proj=longlat +datum=WGS84 +no_defs").is_geographic());
    }

    #[test]
    fn test_unknown_crs_has_no_definition() {
        let none = CRS { epsg: None, proj: None };
        assert!(matches!(none.proj_definition(), Err(Error::UnsupportedCrs(_))));
    }
}
