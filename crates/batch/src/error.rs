//! Framing-level errors of the batch drivers

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a whole run
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Input root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Core(#[from] limnosat_core::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid directory pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Parallel(#[from] limnosat_parallel::ParallelError),

    #[error("Missing column '{0}' in match-up table")]
    MissingColumn(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BatchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;
