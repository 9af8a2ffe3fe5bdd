//! Randomized train/test partitioning

use crate::error::{Result, ScoringError};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Row indices assigned to each side of a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Split configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows sent to the test partition
    pub test_size: f64,
    /// Seed for the row shuffle
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.3,
            random_state: 42,
        }
    }
}

/// Deterministic train/test splitter
#[derive(Debug, Clone)]
pub struct DatasetSplitter {
    config: SplitConfig,
}

impl Default for DatasetSplitter {
    fn default() -> Self {
        Self::with_config(SplitConfig::default())
    }
}

impl DatasetSplitter {
    /// Create a splitter sending `test_size` of the rows to the test side
    pub fn new(test_size: f64) -> Self {
        Self {
            config: SplitConfig {
                test_size,
                ..SplitConfig::default()
            },
        }
    }

    pub fn with_config(config: SplitConfig) -> Self {
        Self { config }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.config.random_state = seed;
        self
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Number of test rows for a dataset of `n_samples` rows.
    ///
    /// Rounds up, leaving the remainder to the train side.
    pub fn test_rows(&self, n_samples: usize) -> usize {
        (self.config.test_size * n_samples as f64).ceil() as usize
    }

    /// Assign row indices to train and test
    pub fn split_indices(&self, n_samples: usize) -> Result<SplitIndices> {
        let test_size = self.config.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ScoringError::InvalidFraction {
                fraction: test_size,
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if n_samples == 0 {
            return Err(ScoringError::EmptyDataset(
                "cannot split a dataset with zero rows".to_string(),
            ));
        }

        let n_test = self.test_rows(n_samples);
        let n_train = n_samples.saturating_sub(n_test);
        if n_test == 0 || n_train == 0 {
            return Err(ScoringError::InvalidFraction {
                fraction: test_size,
                reason: format!(
                    "too extreme for {} rows, leaves {} train and {} test rows",
                    n_samples, n_train, n_test
                ),
            });
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        indices.shuffle(&mut rng);

        let train_indices = indices.split_off(n_test);
        Ok(SplitIndices {
            train_indices,
            test_indices: indices,
        })
    }

    /// Split a DataFrame into `(train, test)`
    pub fn split(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let indices = self.split_indices(df.height())?;

        let train = take_rows(df, &indices.train_indices)?;
        let test = take_rows(df, &indices.test_indices)?;

        debug!(
            rows = df.height(),
            train_rows = train.height(),
            test_rows = test.height(),
            seed = self.config.random_state,
            "Split dataset"
        );

        Ok((train, test))
    }
}

/// Gather rows by position, preserving the order of `indices`
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}
