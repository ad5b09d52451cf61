//! limnosat CLI - chlorophyll-a retrieval and match-up extraction for
//! ACOLITE Landsat 8/9 water products

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use limnosat_algorithms::sampling::sample_lonlat;
use limnosat_algorithms::statistics::CellStatistic;
use limnosat_batch::{
    bloom_batch, write_bloom_csv, AmbiguityPolicy, BatchReport, CompositeBuilder, GroupBy,
    MatchupExtractor, MatchupTable, PipelineConfig, TransformEngine,
};
use limnosat_core::io::read_geotiff;
use limnosat_core::{Raster, TransformCache};
use limnosat_parallel::ProcessingMode;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "limnosat")]
#[command(author, version, about = "Chlorophyll-a retrieval from ACOLITE Landsat products", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write log events to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// JSON pipeline configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Blue/red chlorophyll-a retrieval over a tree of L2W scene directories
    Chla {
        /// Root of the ACOLITE output tree
        #[arg(long)]
        input_root: PathBuf,
        /// Root of the chlorophyll-a output tree (<root>/<YYYY>/<scene>.tif)
        #[arg(long)]
        output_root: PathBuf,
        /// Fixed number of workers (default: all cores)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Scene identifier to skip (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        /// Write 32-bit float rasters
        #[arg(long)]
        float32: bool,
    },
    /// 3x3 mean of a raster at a WGS84 position
    Sample {
        /// Input raster file
        input: PathBuf,
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Sample band reflectances at in-situ match-up records
    Extract {
        /// Match-up table (CSV with Image, Longitude_DD, Latitude_DD)
        #[arg(long)]
        matchups: PathBuf,
        /// Root of the ACOLITE output tree
        #[arg(long)]
        scene_root: PathBuf,
        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,
        /// Several matching directories: reject, first-sorted
        #[arg(long, value_parser = parse_policy)]
        ambiguity: Option<AmbiguityPolicy>,
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Bloom intensity, extent, severity and data availability per raster
    Bloom {
        /// Directory of chlorophyll-a rasters
        #[arg(long)]
        input_dir: PathBuf,
        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,
        /// Lake surface area in km2
        #[arg(long)]
        lake_area: Option<f64>,
        /// Pixel area in km2 (default: from the raster transform)
        #[arg(long)]
        pixel_area: Option<f64>,
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Monthly or annual cell-statistic composites
    Composite {
        /// Directory of chlorophyll-a rasters
        #[arg(long)]
        input_dir: PathBuf,
        /// Output directory (<dir>/<statistic>/<group>.tif)
        #[arg(long)]
        output_dir: PathBuf,
        /// Grouping: month, year
        #[arg(long, value_parser = parse_group_by)]
        by: Option<GroupBy>,
        /// Statistic: mean, max, min, std (repeatable)
        #[arg(long = "stat", value_parser = parse_statistic)]
        stats: Vec<CellStatistic>,
        /// Keep zero-valued pixels instead of setting them to nodata
        #[arg(long)]
        keep_zero: bool,
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to install log subscriber")?;
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to install log subscriber")?;
        }
    }
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn summary(name: &str, report: &BatchReport, elapsed: std::time::Duration) {
    println!("{name}: {report}");
    for omission in &report.omissions {
        println!("  omitted {}: {}", omission.unit, omission.reason);
    }
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_policy(s: &str) -> std::result::Result<AmbiguityPolicy, String> {
    s.parse().map_err(|e: limnosat_batch::BatchError| e.to_string())
}

fn parse_group_by(s: &str) -> std::result::Result<GroupBy, String> {
    s.parse().map_err(|e: limnosat_batch::BatchError| e.to_string())
}

fn parse_statistic(s: &str) -> std::result::Result<CellStatistic, String> {
    s.parse().map_err(|e: limnosat_core::Error| e.to_string())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_file.as_deref())?;
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: none"),
            }
            println!("NoData: {}", raster.nodata().map_or("NaN".to_string(), |v| v.to_string()));
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            if !raster.is_empty() {
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len() as f64
                );
            }
        }

        // ── Retrieval ────────────────────────────────────────────────
        Commands::Chla {
            input_root,
            output_root,
            workers,
            exclude,
            float32,
        } => {
            if workers.is_some() {
                config.workers = workers;
            }
            config.transform.exclusions.extend(exclude);
            config.transform.float32_output |= float32;
            config.validate().context("Invalid configuration")?;

            let start = Instant::now();
            let pb = spinner("Retrieving chlorophyll-a...");
            let report = TransformEngine::new(&config)
                .run(&input_root, &output_root)
                .context("Chlorophyll-a batch failed")?;
            pb.finish_and_clear();
            summary("Chlorophyll-a", &report, start.elapsed());
        }

        // ── Sampling ─────────────────────────────────────────────────
        Commands::Sample { input, lon, lat } => {
            let raster = read_raster(&input)?;
            let mut cache = TransformCache::new();
            let value = sample_lonlat(&raster, &mut cache, lon, lat)
                .with_context(|| format!("Failed to sample {} at ({lon}, {lat})", input.display()))?;
            match value {
                Some(v) => println!("{v}"),
                None => println!("no value"),
            }
        }

        Commands::Extract {
            matchups,
            scene_root,
            output,
            ambiguity,
            workers,
        } => {
            if workers.is_some() {
                config.workers = workers;
            }
            if let Some(policy) = ambiguity {
                config.extraction.ambiguity = policy;
            }
            config.validate().context("Invalid configuration")?;

            let table = MatchupTable::from_csv_path(&matchups)
                .with_context(|| format!("Failed to read match-up table {}", matchups.display()))?;

            let start = Instant::now();
            let pb = spinner("Indexing scene directories...");
            let extractor = MatchupExtractor::new(&config, &scene_root)
                .with_context(|| format!("Failed to index {}", scene_root.display()))?;
            pb.set_message("Extracting match-ups...");
            let (filled, report) = extractor.run(&table).context("Match-up extraction failed")?;
            pb.finish_and_clear();

            filled
                .write_csv_path(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Match-ups saved to: {}", output.display());
            summary("Match-up extraction", &report, start.elapsed());
        }

        // ── Statistics ───────────────────────────────────────────────
        Commands::Bloom {
            input_dir,
            output,
            lake_area,
            pixel_area,
            workers,
        } => {
            if lake_area.is_some() {
                config.bloom.lake_area_km2 = lake_area;
            }
            if pixel_area.is_some() {
                config.bloom.pixel_area_km2 = pixel_area;
            }
            let mode = ProcessingMode::from_workers(workers.or(config.workers));

            let start = Instant::now();
            let pb = spinner("Computing bloom indicators...");
            let (rows, report) = bloom_batch(&input_dir, &config.bloom, mode)
                .context("Bloom indicators failed")?;
            pb.finish_and_clear();

            write_bloom_csv(&output, &rows)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Bloom indicators saved to: {}", output.display());
            summary("Bloom indicators", &report, start.elapsed());
        }

        Commands::Composite {
            input_dir,
            output_dir,
            by,
            stats,
            keep_zero,
            workers,
        } => {
            if workers.is_some() {
                config.workers = workers;
            }
            if let Some(by) = by {
                config.composite.group_by = by;
            }
            if !stats.is_empty() {
                config.composite.statistics = stats;
            }
            if keep_zero {
                config.composite.zero_as_nodata = false;
            }
            config.validate().context("Invalid configuration")?;

            let start = Instant::now();
            let pb = spinner("Building composites...");
            let report = CompositeBuilder::new(&config)
                .run(&input_dir, &output_dir)
                .context("Composites failed")?;
            pb.finish_and_clear();
            summary("Composites", &report, start.elapsed());
        }
    }

    Ok(())
}
