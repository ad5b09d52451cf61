//! Batch chlorophyll-a transform engine
//!
//! Walks a tree of scene directories, runs the blue/red retrieval on each
//! eligible scene and writes `<output_root>/<YYYY>/<scene id>.tif`. Scenes
//! are dispatched to a fixed worker pool; each worker opens and closes its
//! own rasters. A scene that fails, for whatever reason, is reported as an
//! omission and never stops its siblings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use limnosat_algorithms::imagery::blue_red_chla;
use limnosat_core::io::{read_geotiff, write_geotiff, GeoTiffOptions, SampleType};
use limnosat_core::Raster;
use limnosat_parallel::{map_isolated, ProcessingMode};
use tracing::{debug, info};

use crate::config::{BandCatalog, PipelineConfig, RetrievalBands};
use crate::error::Result;
use crate::report::{BatchReport, OmissionReason};
use crate::scene::{dir_name, discover_scene_dirs, Scene};

/// Per-scene outcome: the written path, or why nothing was written
pub type SceneOutcome = std::result::Result<PathBuf, OmissionReason>;

/// Applies the retrieval to every eligible scene under a root directory
#[derive(Debug, Clone)]
pub struct TransformEngine {
    catalog: BandCatalog,
    retrieval: RetrievalBands,
    exclusions: BTreeSet<String>,
    scene_suffix: String,
    output: GeoTiffOptions,
    mode: ProcessingMode,
}

impl TransformEngine {
    pub fn new(config: &PipelineConfig) -> Self {
        let sample_type = if config.transform.float32_output {
            SampleType::Float32
        } else {
            SampleType::Float64
        };
        Self {
            catalog: config.bands.clone(),
            retrieval: config.transform.retrieval.clone(),
            exclusions: config.transform.exclusions.clone(),
            scene_suffix: config.scene_suffix.clone(),
            output: GeoTiffOptions { sample_type },
            mode: ProcessingMode::from_workers(config.workers),
        }
    }

    /// Override the processing mode from the configuration
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Process every scene directory below `input_root`.
    ///
    /// Fails only if `input_root` cannot be enumerated or the worker pool
    /// cannot be built.
    pub fn run(&self, input_root: &Path, output_root: &Path) -> Result<BatchReport> {
        let dirs = discover_scene_dirs(input_root, &self.scene_suffix)?;
        info!(
            root = %input_root.display(),
            scenes = dirs.len(),
            workers = self.mode.workers(),
            "Starting chlorophyll-a batch"
        );

        let mut report = BatchReport::new();

        let mut by_id: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for dir in dirs {
            by_id.entry(dir_name(&dir)).or_default().push(dir);
        }

        let mut queue = Vec::with_capacity(by_id.len());
        for (id, mut paths) in by_id {
            if self.exclusions.contains(&id) {
                report.omit(id, OmissionReason::Excluded);
            } else if paths.len() > 1 {
                // Both copies would write the same output file
                report.omit(id, OmissionReason::DuplicateScene { paths });
            } else if let Some(dir) = paths.pop() {
                queue.push(dir);
            }
        }

        let outcomes = map_isolated(&self.mode, &queue, |dir| {
            self.process_scene(dir, output_root)
        })?;

        for (dir, outcome) in queue.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(path)) => report.record_output(path.display().to_string()),
                Ok(Err(reason)) => report.omit(dir_name(dir), reason),
                Err(panicked) => report.omit(dir_name(dir), OmissionReason::failed(panicked)),
            }
        }

        info!(summary = %report, "Chlorophyll-a batch finished");
        Ok(report)
    }

    /// Run the retrieval for one scene directory.
    ///
    /// Exclusion and naming are checked before any file is opened; a missing
    /// band file is an expected omission; everything else is `Failed`.
    pub fn process_scene(&self, dir: &Path, output_root: &Path) -> SceneOutcome {
        let id = dir_name(dir);
        if self.exclusions.contains(&id) {
            return Err(OmissionReason::Excluded);
        }

        let scene = Scene::parse(&id, &self.scene_suffix)?;
        let blue_path = self.band_path(dir, &scene, &self.retrieval.blue)?;
        let red_path = self.band_path(dir, &scene, &self.retrieval.red)?;
        let out = scene.output_path(output_root);

        self.retrieve(&blue_path, &red_path, &out)
            .map_err(OmissionReason::failed)?;
        Ok(out)
    }

    fn band_path(&self, dir: &Path, scene: &Scene, key: &str) -> std::result::Result<PathBuf, OmissionReason> {
        let name = self.catalog.file_name(scene.sensor(), key).ok_or_else(|| {
            OmissionReason::failed(format!("band '{key}' has no file name for {}", scene.sensor()))
        })?;
        let path = dir.join(name);
        if !path.is_file() {
            return Err(OmissionReason::MissingBand {
                band: key.to_string(),
                path,
            });
        }
        Ok(path)
    }

    fn retrieve(&self, blue_path: &Path, red_path: &Path, out: &Path) -> limnosat_core::Result<()> {
        debug!(blue = %blue_path.display(), red = %red_path.display(), "Reading bands");
        let blue: Raster<f64> = read_geotiff(blue_path)?;
        let red: Raster<f64> = read_geotiff(red_path)?;

        let chla = blue_red_chla(&blue, &red)?;
        write_geotiff(&chla, out, Some(self.output.clone()))?;
        debug!(output = %out.display(), "Wrote chlorophyll-a raster");
        Ok(())
    }
}
