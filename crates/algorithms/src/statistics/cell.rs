//! Cell statistics over a raster stack
//!
//! Each output pixel summarizes the same pixel across all inputs, skipping
//! NaN/nodata samples. Used to build monthly and annual composites.

use limnosat_core::raster::{Raster, RasterElement};
use limnosat_core::{Error, Result};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-pixel statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatistic {
    Mean,
    #[serde(alias = "maximum")]
    Max,
    #[serde(alias = "minimum")]
    Min,
    /// Population standard deviation
    #[serde(alias = "stddev")]
    Std,
}

impl CellStatistic {
    pub const ALL: [CellStatistic; 4] = [Self::Mean, Self::Max, Self::Min, Self::Std];

    /// Lower-case name, also used as output directory name
    pub fn name(&self) -> &'static str {
        match self {
            CellStatistic::Mean => "mean",
            CellStatistic::Max => "max",
            CellStatistic::Min => "min",
            CellStatistic::Std => "std",
        }
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        match self {
            CellStatistic::Mean => Some(values.iter().sum::<f64>() / n),
            CellStatistic::Max => values.iter().copied().reduce(f64::max),
            CellStatistic::Min => values.iter().copied().reduce(f64::min),
            CellStatistic::Std => {
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                Some(var.sqrt())
            }
        }
    }
}

impl fmt::Display for CellStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellStatistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "max" | "maximum" => Ok(Self::Max),
            "min" | "minimum" => Ok(Self::Min),
            "std" | "stddev" => Ok(Self::Std),
            _ => Err(Error::InvalidParameter {
                name: "statistic",
                value: s.to_string(),
                reason: "expected mean, max, min or std".into(),
            }),
        }
    }
}

/// Compute `statistic` per pixel across `stack`.
///
/// All rasters must share the first raster's shape; the output takes its
/// transform and CRS from the first raster. Pixels without any valid input
/// are NaN. With `zero_as_nodata`, output pixels equal to zero are set to
/// NaN as well.
pub fn cell_statistics<T: RasterElement>(
    stack: &[Raster<T>],
    statistic: CellStatistic,
    zero_as_nodata: bool,
) -> Result<Raster<f64>> {
    let template = stack.first().ok_or_else(|| Error::InvalidParameter {
        name: "stack",
        value: "0 rasters".into(),
        reason: "at least one raster is required".into(),
    })?;
    for raster in &stack[1..] {
        template.ensure_same_shape(raster)?;
    }

    let (rows, cols) = template.shape();

    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut samples = Vec::with_capacity(stack.len());

            for (col, out) in row_data.iter_mut().enumerate() {
                samples.clear();
                samples.extend(stack.iter().filter_map(|r| {
                    // shapes checked above
                    let v = unsafe { r.get_unchecked(row, col) };
                    v.valid(r.nodata())
                }));

                if let Some(v) = statistic.reduce(&samples) {
                    if !(zero_as_nodata && v == 0.0) {
                        *out = v;
                    }
                }
            }

            row_data
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), output)
        .map_err(|e| Error::Other(e.to_string()))?;

    template.with_same_meta(array)
}
