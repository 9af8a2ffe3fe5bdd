//! Attribution engine configuration

use crate::error::{Result, ScoringError};
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};

/// Configuration for [`super::LocalExplainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Permutations sampled per explained row
    pub n_permutations: usize,

    /// Also evaluate the reverse of every sampled permutation
    pub antithetic: bool,

    /// Base seed; row `i` uses `seed + i`
    pub seed: u64,

    /// Upper bound on rows sent to the model in one call
    pub max_batch_rows: usize,

    /// Worker threads for row-level parallelism
    pub parallel: ParallelConfig,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            n_permutations: 10,
            antithetic: true,
            seed: 42,
            max_batch_rows: 65_536,
            parallel: ParallelConfig::default(),
        }
    }
}

impl ExplainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_permutations(mut self, n: usize) -> Self {
        self.n_permutations = n;
        self
    }

    pub fn with_antithetic(mut self, antithetic: bool) -> Self {
        self.antithetic = antithetic;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_batch_rows(mut self, rows: usize) -> Self {
        self.max_batch_rows = rows;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Permutation walks evaluated per row
    pub fn evaluations_per_row(&self) -> usize {
        if self.antithetic {
            self.n_permutations * 2
        } else {
            self.n_permutations
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_permutations == 0 {
            return Err(ScoringError::InvalidParameter {
                name: "n_permutations".to_string(),
                value: "0".to_string(),
                reason: "at least one permutation is required".to_string(),
            });
        }
        if self.max_batch_rows == 0 {
            return Err(ScoringError::InvalidParameter {
                name: "max_batch_rows".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.parallel.n_threads == Some(0) {
            return Err(ScoringError::InvalidParameter {
                name: "n_threads".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ExplainerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluations_per_row(), 20);
    }

    #[test]
    fn test_rejects_zero_permutations() {
        let config = ExplainerConfig::new().with_n_permutations(0);
        assert!(matches!(
            config.validate(),
            Err(ScoringError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExplainerConfig = serde_json::from_str(r#"{"n_permutations": 3}"#).unwrap();
        assert_eq!(config.n_permutations, 3);
        assert!(config.antithetic);
        assert_eq!(config.seed, 42);
    }
}
