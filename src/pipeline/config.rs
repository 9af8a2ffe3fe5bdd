//! Job configuration

use crate::error::{Result, ScoringError};
use crate::explainability::ExplainerConfig;
use crate::preprocessing::SplitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration shared by the preprocessing and scoring jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Train/test partitioning, identical in both jobs
    pub split: SplitConfig,

    /// Maximum number of training rows kept as attribution background
    pub background_size: usize,

    /// Seed for drawing the background sample
    pub background_seed: u64,

    /// Attribution engine settings
    pub explainer: ExplainerConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            background_size: 150,
            background_seed: 42,
            explainer: ExplainerConfig::default(),
        }
    }
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file; absent keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScoringError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ScoringError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.split.test_size = test_size;
        self
    }

    /// Seed for the split, background draw and permutation sampling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.random_state = seed;
        self.background_seed = seed;
        self.explainer.seed = seed;
        self
    }

    pub fn with_background_size(mut self, size: usize) -> Self {
        self.background_size = size;
        self
    }

    pub fn with_n_permutations(mut self, n: usize) -> Self {
        self.explainer.n_permutations = n;
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.explainer.parallel = self.explainer.parallel.with_threads(n);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let t = self.split.test_size;
        if !(t > 0.0 && t < 1.0) {
            return Err(ScoringError::InvalidFraction {
                fraction: t,
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.background_size == 0 {
            return Err(ScoringError::InvalidParameter {
                name: "background_size".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        self.explainer.validate()
    }
}
