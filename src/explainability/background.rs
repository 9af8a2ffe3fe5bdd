//! Background reference sample for attribution

use crate::error::{Result, ScoringError};
use crate::preprocessing::take_rows;
use crate::utils::to_input_matrix;
use ndarray::Array2;
use polars::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Rows drawn without replacement from the training partition
#[derive(Debug, Clone)]
pub struct BackgroundSample {
    frame: DataFrame,
}

impl BackgroundSample {
    /// Draw `min(cap, train.height())` rows with a fixed seed
    pub fn draw(train: &DataFrame, cap: usize, seed: u64) -> Result<Self> {
        let n = train.height();
        if n == 0 || cap == 0 {
            return Err(ScoringError::EmptyBackground(format!(
                ": {} training rows, cap {}",
                n, cap
            )));
        }

        let size = cap.min(n);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let indices = rand::seq::index::sample(&mut rng, n, size).into_vec();
        let frame = take_rows(train, &indices)?;

        debug!(rows = size, available = n, seed, "Drew background sample");
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Numeric view of `columns`, in the given order; only `required`
    /// columns must be numeric
    pub fn to_matrix(&self, columns: &[String], required: &[String]) -> Result<Array2<f64>> {
        to_input_matrix(&self.frame, columns, required).map_err(|e| match e {
            ScoringError::SchemaMismatch(msg) => {
                ScoringError::SchemaMismatch(format!("background sample: {}", msg))
            }
            other => other,
        })
    }
}
