//! # limnosat batch
//!
//! Batch drivers of the chlorophyll-a pipeline.
//!
//! - `engine`: per-scene blue/red retrieval over a tree of ACOLITE L2W
//!   scene directories, one output raster per scene
//! - `matchup`: 3x3 band samples at in-situ match-up locations
//! - `bloom`: bloom indicators for every retrieved scene
//! - `composite`: monthly or annual cell statistics of retrieved scenes
//!
//! Every driver returns a [`BatchReport`]. Only failures of the framing loop
//! (missing root, unreadable table, bad configuration) are returned as
//! errors; anything going wrong inside one scene or record becomes an
//! [`Omission`] and the run continues.

pub mod bloom;
pub mod composite;
pub mod config;
pub mod engine;
pub mod error;
pub mod matchup;
pub mod report;
pub mod scene;

pub use bloom::{bloom_batch, write_bloom_csv, BloomRow};
pub use composite::CompositeBuilder;
pub use config::{
    AmbiguityPolicy, BandCatalog, CompositeConfig, ExtractionConfig, GroupBy, PipelineConfig,
    RetrievalBands, TransformConfig,
};
pub use engine::TransformEngine;
pub use error::{BatchError, Result};
pub use matchup::{DirectoryIndex, MatchupExtractor, MatchupTable, Measurements, ScenePattern};
pub use report::{BatchReport, Omission, OmissionReason};
pub use scene::{discover_rasters, discover_scene_dirs, Scene, SceneNameError, Sensor};
