//! Parallel processing utilities

use crate::error::{Result, ScoringError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = rayon's global pool)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n.max(1));
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Fallible parallel map over `0..n`, results in index order.
///
/// Runs on a dedicated pool when `config.n_threads` is set, otherwise on
/// rayon's global pool.
pub fn try_parallel_map<U, F>(n: usize, config: &ParallelConfig, f: F) -> Result<Vec<U>>
where
    U: Send,
    F: Fn(usize) -> Result<U> + Send + Sync,
{
    match config.n_threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| ScoringError::ConfigError(format!("thread pool: {}", e)))?;
            pool.install(|| (0..n).into_par_iter().map(&f).collect())
        }
        None => (0..n).into_par_iter().map(f).collect(),
    }
}
