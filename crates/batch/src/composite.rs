//! Monthly and annual composites of chlorophyll-a rasters
//!
//! Retrieved scenes (`<scene id>.tif`) are grouped by acquisition month
//! across all years, or by year, and each group is reduced with the
//! configured cell statistics into `<output>/<statistic>/<group>.tif`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use limnosat_algorithms::statistics::cell_statistics;
use limnosat_core::io::{read_geotiff, write_geotiff};
use limnosat_core::Raster;
use limnosat_parallel::{map_isolated, ProcessingMode};
use tracing::{debug, info};

use crate::config::{CompositeConfig, GroupBy, PipelineConfig};
use crate::error::Result;
use crate::report::{BatchReport, OmissionReason};
use crate::scene::{dir_name, discover_rasters, Scene};

#[derive(Debug, Default)]
struct GroupOutcome {
    written: Vec<PathBuf>,
    omissions: Vec<(String, OmissionReason)>,
}

/// Builds cell-statistic composites per month or year
#[derive(Debug, Clone)]
pub struct CompositeBuilder {
    config: CompositeConfig,
    scene_suffix: String,
    mode: ProcessingMode,
}

impl CompositeBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.composite.clone(),
            scene_suffix: config.scene_suffix.clone(),
            mode: ProcessingMode::from_workers(config.workers),
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Group key of a raster file, from the scene identifier in its name
    fn group_key(&self, path: &Path) -> std::result::Result<String, OmissionReason> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| OmissionReason::MalformedName {
                detail: format!("{} has no UTF-8 file name", path.display()),
            })?;
        let scene = Scene::parse(stem, &self.scene_suffix)?;
        Ok(match self.config.group_by {
            GroupBy::Month => scene.month_token(),
            GroupBy::Year => scene.year_token(),
        })
    }

    /// Build all composites of the rasters below `input_dir`
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<BatchReport> {
        let files = discover_rasters(input_dir)?;
        let mut report = BatchReport::new();

        let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for path in files {
            match self.group_key(&path) {
                Ok(key) => groups.entry(key).or_default().push(path),
                Err(reason) => report.omit(dir_name(&path), reason),
            }
        }
        info!(
            root = %input_dir.display(),
            groups = groups.len(),
            statistics = self.config.statistics.len(),
            "Building composites"
        );

        let groups: Vec<(String, Vec<PathBuf>)> = groups.into_iter().collect();
        let outcomes = map_isolated(&self.mode, &groups, |(key, paths)| {
            self.build_group(key, paths, output_dir)
        })?;

        for ((key, _), outcome) in groups.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    for (unit, reason) in outcome.omissions {
                        report.omit(unit, reason);
                    }
                    for path in outcome.written {
                        report.record_output(path.display().to_string());
                    }
                }
                Err(panicked) => report.omit(format!("group {key}"), OmissionReason::failed(panicked)),
            }
        }

        info!(summary = %report, "Composites finished");
        Ok(report)
    }

    fn build_group(&self, key: &str, paths: &[PathBuf], output_dir: &Path) -> GroupOutcome {
        let mut outcome = GroupOutcome::default();
        let unit = format!("group {key}");

        let mut stack: Vec<Raster<f64>> = Vec::with_capacity(paths.len());
        for path in paths {
            let raster = match read_geotiff::<f64, _>(path) {
                Ok(r) => r,
                Err(e) => {
                    outcome.omissions.push((dir_name(path), OmissionReason::failed(e)));
                    continue;
                }
            };
            // The first readable raster defines the group's grid
            if let Some(first) = stack.first() {
                if let Err(e) = first.ensure_same_shape(&raster) {
                    outcome.omissions.push((dir_name(path), OmissionReason::failed(e)));
                    continue;
                }
            }
            stack.push(raster);
        }

        if stack.is_empty() {
            outcome
                .omissions
                .push((unit, OmissionReason::failed("no readable rasters in group")));
            return outcome;
        }
        debug!(group = key, rasters = stack.len(), "Reducing group");

        for statistic in &self.config.statistics {
            let out = output_dir.join(statistic.name()).join(format!("{key}.tif"));
            let written = cell_statistics(&stack, *statistic, self.config.zero_as_nodata)
                .and_then(|composite| write_geotiff(&composite, &out, None));
            match written {
                Ok(()) => outcome.written.push(out),
                Err(e) => outcome
                    .omissions
                    .push((format!("{unit} {statistic}"), OmissionReason::failed(e))),
            }
        }
        outcome
    }
}
