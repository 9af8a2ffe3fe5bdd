//! Local explanations (Shapley-value feature attributions)
//!
//! Attributions are estimated by permutation sampling against a background
//! sample. For a row `x`, a permutation π and a background row `b`, the walk
//! starts at `b` and replaces features with `x`'s values in the order π; each
//! feature is credited with the change in model output its replacement causes.
//! Averaging over background rows and sampled permutations gives an unbiased
//! estimate of the interventional Shapley values.
//!
//! Every walk ends at `x`, so the credits of one permutation telescope to
//! `f(x) - mean_b f(b)`. The attributions of a row therefore sum to the
//! prediction's deviation from the base value up to float rounding, whatever
//! the number of permutations. Sampling error only affects how that deviation
//! is shared between features; it shrinks as `1/sqrt(permutations)` and is
//! zero for additive models.

use super::ExplainerConfig;
use crate::error::{Result, ScoringError};
use crate::utils::{try_parallel_map, ParallelConfig};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Relative tolerance on `sum(attributions) - (prediction - base_value)`
pub const LOCAL_ACCURACY_TOLERANCE: f64 = 1e-6;

/// Feature contribution to a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature_index: usize,
    pub feature_name: String,
    /// Feature value for this instance
    pub feature_value: f64,
    /// Contribution to prediction (Shapley value)
    pub contribution: f64,
}

/// Local explanation for a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalExplanation {
    pub instance_index: usize,
    /// Base value (expected prediction over the background)
    pub base_value: f64,
    pub prediction: f64,
    pub contributions: Vec<FeatureContribution>,
}

impl LocalExplanation {
    /// Get sum of contributions
    pub fn sum_contributions(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    /// Get sorted contributions (by absolute value, descending)
    pub fn sorted_contributions(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<&FeatureContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    /// Get top k contributors
    pub fn top_k_contributors(&self, k: usize) -> Vec<&FeatureContribution> {
        self.sorted_contributions().into_iter().take(k).collect()
    }
}

/// Row- and column-aligned attribution table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionMatrix {
    feature_names: Vec<String>,
    /// `values[[i, j]]`: contribution of feature `j` to row `i`
    values: Array2<f64>,
    base_value: f64,
    /// Model output for each explained row
    predictions: Array1<f64>,
}

impl AttributionMatrix {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    pub fn predictions(&self) -> &Array1<f64> {
        &self.predictions
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Attribution column for feature `j`
    pub fn column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.values.column(j)
    }

    pub fn row_sums(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(1))
    }

    /// Largest relative local-accuracy error over all rows
    pub fn local_accuracy_gap(&self) -> f64 {
        self.row_sums()
            .iter()
            .zip(self.predictions.iter())
            .map(|(sum, pred)| {
                let deviation = pred - self.base_value;
                (sum - deviation).abs() / deviation.abs().max(1.0)
            })
            .fold(0.0, f64::max)
    }

    /// Per-row view with feature values taken from `instance`
    pub fn explanation(&self, row: usize, instance: ArrayView1<f64>) -> LocalExplanation {
        let contributions = self
            .values
            .row(row)
            .iter()
            .enumerate()
            .map(|(j, &contribution)| FeatureContribution {
                feature_index: j,
                feature_name: self.feature_names[j].clone(),
                feature_value: instance[j],
                contribution,
            })
            .collect();

        LocalExplanation {
            instance_index: row,
            base_value: self.base_value,
            prediction: self.predictions[row],
            contributions,
        }
    }

    pub fn summary(&self) -> AttributionSummary {
        AttributionSummary::from_matrix(self)
    }
}

/// Permutation-sampling Shapley explainer
pub struct LocalExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync,
{
    /// Prediction function
    predict_fn: F,
    /// Background dataset for computing expectations
    background: Array2<f64>,
    config: ExplainerConfig,
    feature_names: Option<Vec<String>>,
}

/// Background rows without missing values plus their predictions
struct PreparedBackground {
    rows: Array2<f64>,
    predictions: Array1<f64>,
    base_value: f64,
}

impl<F> LocalExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync,
{
    /// Create new local explainer
    pub fn new(predict_fn: F, background: Array2<f64>) -> Self {
        Self {
            predict_fn,
            background,
            config: ExplainerConfig::default(),
            feature_names: None,
        }
    }

    pub fn with_config(mut self, config: ExplainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set number of sampled permutations per row
    pub fn with_n_permutations(mut self, n: usize) -> Self {
        self.config.n_permutations = n;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_antithetic(mut self, antithetic: bool) -> Self {
        self.config.antithetic = antithetic;
        self
    }

    pub fn with_max_batch_rows(mut self, rows: usize) -> Self {
        self.config.max_batch_rows = rows;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set feature names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Explain a single instance
    pub fn explain(&self, instance: &Array1<f64>) -> Result<LocalExplanation> {
        let batch = instance.clone().insert_axis(Axis(0));
        let matrix = self.explain_batch(&batch)?;
        Ok(matrix.explanation(0, instance.view()))
    }

    /// Attributions for every row of `instances`
    pub fn explain_batch(&self, instances: &Array2<f64>) -> Result<AttributionMatrix> {
        self.config.validate()?;
        let n_features = instances.ncols();
        if n_features == 0 {
            return Err(ScoringError::SchemaMismatch(
                "no feature columns to explain".to_string(),
            ));
        }
        if self.background.ncols() != n_features {
            return Err(ScoringError::SchemaMismatch(format!(
                "background has {} features, instances have {}",
                self.background.ncols(),
                n_features
            )));
        }
        let feature_names = self.resolve_feature_names(n_features)?;

        let start = Instant::now();
        let background = self.prepare_background()?;

        let n_rows = instances.nrows();
        let predictions = if n_rows == 0 {
            Array1::zeros(0)
        } else {
            self.evaluate(instances)?
        };

        let rows = try_parallel_map(n_rows, &self.config.parallel, |i| {
            self.explain_row(i, instances.row(i), predictions[i], &background)
        })?;

        let mut values = Array2::<f64>::zeros((n_rows, n_features));
        for (i, row) in rows.into_iter().enumerate() {
            values.row_mut(i).assign(&row);
        }

        let matrix = AttributionMatrix {
            feature_names,
            values,
            base_value: background.base_value,
            predictions,
        };

        let gap = matrix.local_accuracy_gap();
        if gap > LOCAL_ACCURACY_TOLERANCE {
            warn!(gap, tolerance = LOCAL_ACCURACY_TOLERANCE, "Attributions drift from prediction deviation");
        }

        info!(
            rows = n_rows,
            features = n_features,
            background_rows = background.rows.nrows(),
            permutations = self.config.evaluations_per_row(),
            base_value = background.base_value,
            elapsed = ?start.elapsed(),
            "Computed attributions"
        );

        Ok(matrix)
    }

    fn resolve_feature_names(&self, n_features: usize) -> Result<Vec<String>> {
        match &self.feature_names {
            Some(names) if names.len() != n_features => Err(ScoringError::SchemaMismatch(format!(
                "{} feature names for {} features",
                names.len(),
                n_features
            ))),
            Some(names) => Ok(names.clone()),
            None => Ok((0..n_features).map(|j| format!("feature_{}", j)).collect()),
        }
    }

    /// Drop background rows holding NaN, then score the rest once
    fn prepare_background(&self) -> Result<PreparedBackground> {
        let keep: Vec<usize> = self
            .background
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| !v.is_nan()))
            .map(|(i, _)| i)
            .collect();

        let dropped = self.background.nrows() - keep.len();
        if dropped > 0 {
            debug!(dropped, kept = keep.len(), "Excluded background rows with missing values");
        }
        if keep.is_empty() {
            let detail = if self.background.nrows() == 0 {
                String::new()
            } else {
                format!(": all {} rows contain missing values", self.background.nrows())
            };
            return Err(ScoringError::EmptyBackground(detail));
        }

        let rows = self.background.select(Axis(0), &keep);
        let predictions = self.evaluate(&rows)?;
        let base_value = predictions.sum() / predictions.len() as f64;

        Ok(PreparedBackground {
            rows,
            predictions,
            base_value,
        })
    }

    /// Call the model, checking it returns one value per row
    fn evaluate(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let preds = (self.predict_fn)(x).map_err(|e| match e {
            ScoringError::ModelInvocation(msg) => ScoringError::ModelInvocation(msg),
            other => ScoringError::ModelInvocation(other.to_string()),
        })?;
        if preds.len() != x.nrows() {
            return Err(ScoringError::ModelInvocation(format!(
                "model returned {} predictions for {} rows",
                preds.len(),
                x.nrows()
            )));
        }
        Ok(preds)
    }

    fn explain_row(
        &self,
        row_index: usize,
        instance: ArrayView1<f64>,
        prediction: f64,
        background: &PreparedBackground,
    ) -> Result<Array1<f64>> {
        let n_features = instance.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(row_index as u64));
        let mut totals = Array1::<f64>::zeros(n_features);
        let mut walks = 0usize;

        let mut perm: Vec<usize> = (0..n_features).collect();
        for _ in 0..self.config.n_permutations {
            perm.shuffle(&mut rng);
            self.walk_permutation(&perm, instance, prediction, background, &mut totals)?;
            walks += 1;

            if self.config.antithetic {
                let reversed: Vec<usize> = perm.iter().rev().copied().collect();
                self.walk_permutation(&reversed, instance, prediction, background, &mut totals)?;
                walks += 1;
            }
        }

        totals /= walks as f64;
        Ok(totals)
    }

    /// Credit each feature of `perm` with its marginal effect, averaged over
    /// the background rows, and add the credits to `totals`.
    ///
    /// Coalitions strictly between the background and the instance are sent
    /// to the model in batches of whole steps of at most `max_batch_rows`.
    fn walk_permutation(
        &self,
        perm: &[usize],
        instance: ArrayView1<f64>,
        prediction: f64,
        background: &PreparedBackground,
        totals: &mut Array1<f64>,
    ) -> Result<()> {
        let n_features = perm.len();
        let n_background = background.rows.nrows();
        let steps_per_call = (self.config.max_batch_rows / n_background).max(1);

        let mut coalition = background.rows.clone();
        let mut previous = background.predictions.clone();

        // Steps 1..n_features-1 are intermediate; step n_features is the instance itself.
        let mut step = 1;
        while step < n_features {
            let chunk_end = (step + steps_per_call).min(n_features);
            let chunk_len = chunk_end - step;
            let mut batch = Array2::<f64>::zeros((chunk_len * n_background, n_features));

            for (k, at) in (step..chunk_end).enumerate() {
                let feature = perm[at - 1];
                coalition.column_mut(feature).fill(instance[feature]);
                batch
                    .slice_mut(s![k * n_background..(k + 1) * n_background, ..])
                    .assign(&coalition);
            }

            let outputs = self.evaluate(&batch)?;
            for (k, at) in (step..chunk_end).enumerate() {
                let current = outputs.slice(s![k * n_background..(k + 1) * n_background]);
                let delta = current
                    .iter()
                    .zip(previous.iter())
                    .map(|(c, p)| c - p)
                    .sum::<f64>()
                    / n_background as f64;
                totals[perm[at - 1]] += delta;
                previous.assign(&current);
            }

            step = chunk_end;
        }

        let last = perm[n_features - 1];
        let delta = previous.iter().map(|p| prediction - p).sum::<f64>() / n_background as f64;
        totals[last] += delta;

        Ok(())
    }
}

/// Summary of attributions across many rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionSummary {
    pub feature_names: Vec<String>,
    /// Mean absolute attribution per feature
    pub mean_abs: Vec<f64>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl AttributionSummary {
    pub fn from_matrix(matrix: &AttributionMatrix) -> Self {
        let values = matrix.values();
        let n_features = values.ncols();
        if values.nrows() == 0 {
            return Self {
                feature_names: matrix.feature_names().to_vec(),
                mean_abs: vec![0.0; n_features],
                mean: vec![0.0; n_features],
                std: vec![0.0; n_features],
                min: vec![0.0; n_features],
                max: vec![0.0; n_features],
            };
        }

        let mut summary = Self {
            feature_names: matrix.feature_names().to_vec(),
            mean_abs: Vec::with_capacity(n_features),
            mean: Vec::with_capacity(n_features),
            std: Vec::with_capacity(n_features),
            min: Vec::with_capacity(n_features),
            max: Vec::with_capacity(n_features),
        };

        for column in values.columns() {
            let n = column.len() as f64;
            let mean = column.sum() / n;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            summary.mean_abs.push(column.iter().map(|v| v.abs()).sum::<f64>() / n);
            summary.mean.push(mean);
            summary.std.push(var.sqrt());
            summary.min.push(column.iter().copied().fold(f64::INFINITY, f64::min));
            summary.max.push(column.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        }

        summary
    }

    /// Feature ranking by mean absolute attribution
    pub fn feature_ranking(&self) -> Vec<(&str, f64)> {
        let mut indexed: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .map(|s| s.as_str())
            .zip(self.mean_abs.iter().copied())
            .collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        indexed
    }
}
