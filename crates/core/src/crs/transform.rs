//! Coordinate transformation pipelines (pure Rust, `proj4rs` + `crs-definitions`).
//!
//! A [`CoordinateTransform`] is built for one (source, target) pair and can
//! then be applied to any number of points. Geographic coordinates are passed
//! and returned in degrees; the radian conversion required by `proj4rs`
//! happens inside.

use std::collections::HashMap;
use std::fmt;

use proj4rs::proj::Proj;

use super::CRS;
use crate::error::{Error, Result};

/// A reusable transformation pipeline between two coordinate reference systems.
pub struct CoordinateTransform {
    source: CRS,
    target: CRS,
    source_proj: Proj,
    target_proj: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl CoordinateTransform {
    /// Build the pipeline for `source -> target`.
    ///
    /// The pipeline is always constructed, even when both CRSs are the same;
    /// the identity case then round-trips through `proj4rs` like any other.
    pub fn new(source: &CRS, target: &CRS) -> Result<Self> {
        let source_def = source.proj_definition()?;
        let target_def = target.proj_definition()?;

        let source_proj = Proj::from_proj_string(&source_def).map_err(|e| Error::Projection {
            from: source.identifier(),
            to: target.identifier(),
            reason: format!("invalid source definition: {e:?}"),
        })?;
        let target_proj = Proj::from_proj_string(&target_def).map_err(|e| Error::Projection {
            from: source.identifier(),
            to: target.identifier(),
            reason: format!("invalid target definition: {e:?}"),
        })?;

        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            source_proj,
            target_proj,
            source_geographic: source.is_geographic(),
            target_geographic: target.is_geographic(),
        })
    }

    /// Build the pipeline from WGS84 longitude/latitude into `target`.
    pub fn from_wgs84(target: &CRS) -> Result<Self> {
        Self::new(&CRS::wgs84(), target)
    }

    pub fn source(&self) -> &CRS {
        &self.source
    }

    pub fn target(&self) -> &CRS {
        &self.target
    }

    /// Transform a single point. For geographic CRSs `x` is longitude and
    /// `y` latitude, in degrees.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (x_in, y_in) = if self.source_geographic {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        let mut point = (x_in, y_in, 0.0);
        proj4rs::transform::transform(&self.source_proj, &self.target_proj, &mut point).map_err(
            |e| Error::Projection {
                from: self.source.identifier(),
                to: self.target.identifier(),
                reason: format!("{e:?}"),
            },
        )?;

        let (out_x, out_y) = if self.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(Error::Projection {
                from: self.source.identifier(),
                to: self.target.identifier(),
                reason: format!("non-finite result for ({x}, {y})"),
            });
        }

        Ok((out_x, out_y))
    }
}

impl fmt::Debug for CoordinateTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateTransform")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// WGS84 -> target pipelines, built once per distinct target CRS.
///
/// A cache is owned by one unit of work (one worker, one record); it is not
/// shared between threads.
#[derive(Debug, Default)]
pub struct TransformCache {
    pipelines: HashMap<CRS, CoordinateTransform>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline from WGS84 into `target`, building it on first use.
    pub fn from_wgs84(&mut self, target: &CRS) -> Result<&CoordinateTransform> {
        if !self.pipelines.contains_key(target) {
            let pipeline = CoordinateTransform::from_wgs84(target)?;
            self.pipelines.insert(target.clone(), pipeline);
        }
        self.pipelines
            .get(target)
            .ok_or_else(|| Error::Other(format!("transform cache lost entry for {target}")))
    }

    /// Number of distinct pipelines built so far
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
