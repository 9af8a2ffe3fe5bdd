//! Regression model artifacts and prediction

use crate::error::{Result, ScoringError};
use crate::utils::{column_names, to_feature_matrix};
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,
    /// Model version
    pub version: String,
    /// Training timestamp (ISO 8601)
    #[serde(default)]
    pub trained_at: String,
    /// Feature names, in the order the model consumes them
    pub feature_names: Vec<String>,
    /// Target name
    pub target_name: String,
    /// Training metrics
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>, feature_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            trained_at: String::new(),
            feature_names,
            target_name: "target".to_string(),
            metrics: HashMap::new(),
        }
    }

    /// Set version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set target name
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = target.into();
        self
    }
}

/// Node of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        /// Child taken when `x[feature] < threshold`
        left: usize,
        right: usize,
        /// Direction for `NaN` inputs
        #[serde(default = "default_true")]
        missing_left: bool,
    },
    Leaf {
        value: f64,
    },
}

fn default_true() -> bool {
    true
}

/// Regression tree stored as a flat node list rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let x = row[*feature];
                    let go_left = if x.is_nan() { *missing_left } else { x < *threshold };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    /// Check node references; children must point forward so walks terminate
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { feature, left, right, threshold, .. } = node {
                if *feature >= n_features {
                    return Err(format!(
                        "node {} splits on feature {} but the model has {} features",
                        idx, feature, n_features
                    ));
                }
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", idx, child));
                    }
                }
                if threshold.is_nan() {
                    return Err(format!("node {} has a NaN threshold", idx));
                }
            }
        }
        Ok(())
    }
}

/// Supported regression models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressionModel {
    /// `intercept + Σ coefficients[j] · x[j]`
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    /// `base_score + Σ tree(x)`
    TreeEnsemble {
        base_score: f64,
        trees: Vec<RegressionTree>,
    },
}

impl RegressionModel {
    fn model_type(&self) -> &'static str {
        match self {
            RegressionModel::Linear { .. } => "linear",
            RegressionModel::TreeEnsemble { .. } => "tree_ensemble",
        }
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        match self {
            RegressionModel::Linear { coefficients, .. } => {
                if coefficients.len() != n_features {
                    return Err(format!(
                        "{} coefficients for {} features",
                        coefficients.len(),
                        n_features
                    ));
                }
                Ok(())
            }
            RegressionModel::TreeEnsemble { trees, .. } => {
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(n_features).map_err(|e| format!("tree {}: {}", i, e))?;
                }
                Ok(())
            }
        }
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            RegressionModel::Linear { coefficients, intercept } => coefficients
                .iter()
                .zip(row.iter())
                .fold(*intercept, |acc, (c, x)| acc + c * x),
            RegressionModel::TreeEnsemble { base_score, trees } => trees
                .iter()
                .fold(*base_score, |acc, tree| acc + tree.predict_row(row)),
        }
    }
}

/// Serialized form of a model in the artifact store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: RegressionModel,
}

impl ModelArtifact {
    pub fn new(metadata: ModelMetadata, model: RegressionModel) -> Self {
        Self { metadata, model }
    }

    /// Structural checks run on every load
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.metadata.feature_names.is_empty() {
            return Err("model declares no features".to_string());
        }
        self.model.validate(self.metadata.feature_names.len())
    }
}

/// Position of each model feature within a caller's column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    /// `source_index[k]` is the input column holding model feature `k`
    source_index: Vec<usize>,
    n_inputs: usize,
}

/// A model loaded from the artifact store, shared read-only across workers
#[derive(Debug, Clone)]
pub struct LoadedModel {
    artifact: ModelArtifact,
}

impl LoadedModel {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        artifact.validate().map_err(|reason| ScoringError::ModelLoad {
            uri: artifact.metadata.name.clone(),
            reason,
        })?;
        Ok(Self { artifact })
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.artifact.metadata
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifact.metadata.feature_names
    }

    pub fn model_type(&self) -> &'static str {
        self.artifact.model.model_type()
    }

    /// Map model features onto `columns`.
    ///
    /// Every model feature must be present; extra columns are ignored.
    pub fn layout_for(&self, columns: &[String]) -> Result<FeatureLayout> {
        let missing: Vec<&String> = self
            .feature_names()
            .iter()
            .filter(|f| !columns.contains(f))
            .collect();
        if !missing.is_empty() {
            return Err(ScoringError::SchemaMismatch(format!(
                "model '{}' expects columns {:?} which are missing from the input",
                self.metadata().name,
                missing
            )));
        }

        let extra: Vec<&String> = columns
            .iter()
            .filter(|c| !self.feature_names().contains(c))
            .collect();
        if !extra.is_empty() {
            warn!(model = %self.metadata().name, columns = ?extra, "Ignoring columns unknown to the model");
        }

        let source_index = self
            .feature_names()
            .iter()
            .filter_map(|f| columns.iter().position(|c| c == f))
            .collect();

        Ok(FeatureLayout {
            source_index,
            n_inputs: columns.len(),
        })
    }

    /// Predict rows of `x`, whose columns follow `layout`
    pub fn predict_matrix(&self, x: &Array2<f64>, layout: &FeatureLayout) -> Result<Array1<f64>> {
        if x.ncols() != layout.n_inputs {
            return Err(ScoringError::SchemaMismatch(format!(
                "expected {} input columns, got {}",
                layout.n_inputs,
                x.ncols()
            )));
        }

        let mut features = vec![0.0; layout.source_index.len()];
        let preds = x
            .rows()
            .into_iter()
            .map(|row| {
                for (slot, &src) in features.iter_mut().zip(layout.source_index.iter()) {
                    *slot = row[src];
                }
                self.artifact.model.predict_row(ArrayView1::from(&features[..]))
            })
            .collect::<Vec<f64>>();

        Ok(Array1::from_vec(preds))
    }

    /// Predict one value per row of `df`, in row order
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        self.layout_for(&column_names(df))?;
        let x = to_feature_matrix(df, self.feature_names())?;
        let preds = x
            .rows()
            .into_iter()
            .map(|row| self.artifact.model.predict_row(row))
            .collect::<Vec<f64>>();
        Ok(Array1::from_vec(preds))
    }
}
