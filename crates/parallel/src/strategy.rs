//! Processing modes and the parallel map

use rayon::prelude::*;
use thiserror::Error;

/// Errors setting up parallel execution
#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("Invalid worker count: {0}")]
    InvalidWorkers(usize),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Processing mode for batch work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Fixed-size pool of the given number of workers
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for an optional configured worker count; `None` uses all cores.
    pub fn from_workers(workers: Option<usize>) -> Self {
        match workers {
            None => ProcessingMode::Parallel,
            Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n),
        }
    }

    /// Number of workers this mode runs on
    pub fn workers(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => num_cpus(),
            ProcessingMode::ParallelWith(n) => *n,
        }
    }
}

/// Strategy for executing independent work items
pub trait ParallelStrategy {
    /// Map `f` over `items`, preserving input order in the output.
    ///
    /// Each item is handed to exactly one worker.
    fn par_map<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>, ParallelError>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>, ParallelError>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(items.iter().map(f).collect()),
            ProcessingMode::Parallel => Ok(items.par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                if *threads == 0 {
                    return Err(ParallelError::InvalidWorkers(0));
                }
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .thread_name(|i| format!("limnosat-worker-{i}"))
                    .build()?;
                Ok(pool.install(|| items.par_iter().map(f).collect()))
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}
