//! Model loading and batch prediction

use crate::error::{Result, ScoringError};
use crate::export::{ModelRegistry, ModelUri};
use super::{LoadedModel, ModelArtifact};
use ndarray::Array1;
use polars::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::time::Instant;
use tracing::{debug, info};

/// Loads model artifacts and scores frames with them
pub struct ModelScorer;

impl ModelScorer {
    /// Resolve `name` through `registry` and load the artifact
    pub fn load_named(registry: &dyn ModelRegistry, name: &str) -> Result<LoadedModel> {
        let uri = registry.resolve(name)?;
        info!(model = name, uri = %uri, "Resolved model");
        Self::load(&uri)
    }

    /// Load and validate the artifact at `uri`
    pub fn load(uri: &ModelUri) -> Result<LoadedModel> {
        let path = uri.to_path()?;
        if !path.is_file() {
            return Err(ScoringError::ModelNotFound(uri.to_string()));
        }

        let file = File::open(&path).map_err(|e| ScoringError::ModelLoad {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ScoringError::ModelLoad {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let model = LoadedModel::from_artifact(artifact).map_err(|e| match e {
            ScoringError::ModelLoad { reason, .. } => ScoringError::ModelLoad {
                uri: uri.to_string(),
                reason,
            },
            other => other,
        })?;

        debug!(
            uri = %uri,
            model_type = model.model_type(),
            version = %model.metadata().version,
            features = model.feature_names().len(),
            "Loaded model"
        );
        Ok(model)
    }

    /// One prediction per row of `df`, in row order
    pub fn predict(model: &LoadedModel, df: &DataFrame) -> Result<Array1<f64>> {
        let start = Instant::now();
        let preds = model.predict(df)?;
        debug!(rows = df.height(), elapsed = ?start.elapsed(), "Scored batch");
        Ok(preds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{LocalModelRegistry, ModelVersion};
    use crate::inference::{ModelMetadata, RegressionModel};
    use std::io::Write;
    use tempfile::TempDir;

    fn artifact() -> ModelArtifact {
        ModelArtifact::new(
            ModelMetadata::new("sum", vec!["x1".to_string(), "x2".to_string()]),
            RegressionModel::Linear {
                coefficients: vec![1.0, 1.0],
                intercept: 0.0,
            },
        )
    }

    #[test]
    fn test_load_named_and_predict() {
        let dir = TempDir::new().unwrap();
        let mut registry = LocalModelRegistry::open(dir.path()).unwrap();
        registry.register("sum", ModelVersion::default(), &artifact()).unwrap();

        let model = ModelScorer::load_named(&registry, "sum").unwrap();
        let df = df!("x1" => &[1.0, 2.0], "x2" => &[0.25, 0.5]).unwrap();
        let preds = ModelScorer::predict(&model, &df).unwrap();
        assert_eq!(preds.to_vec(), vec![1.25, 2.5]);
    }

    #[test]
    fn test_load_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let uri = ModelUri::from_path(&dir.path().join("nope.json"));
        assert!(matches!(ModelScorer::load(&uri), Err(ScoringError::ModelNotFound(_))));
    }

    #[test]
    fn test_load_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{{\"metadata\": 3}}").unwrap();

        let err = ModelScorer::load(&ModelUri::from_path(&path)).unwrap_err();
        match err {
            ScoringError::ModelLoad { uri, .. } => assert!(uri.ends_with("broken.json")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
