//! Job 2: score a held-out batch and attach per-feature attributions

use super::ScoringConfig;
use crate::error::Result;
use crate::explainability::{AttributionSummary, BackgroundSample, LocalExplainer};
use crate::export::{ModelRegistry, ResultAssembler};
use crate::inference::ModelScorer;
use crate::preprocessing::DatasetSplitter;
use crate::utils::{column_names, to_input_matrix, ScoringBatchLoader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Inputs of one scoring run
#[derive(Debug, Clone)]
pub struct ScoringRequest {
    /// Training data (file, descriptor directory or directory of CSVs)
    pub training_data: PathBuf,
    /// Batch to score
    pub scoring_data: PathBuf,
    pub model_name: String,
    pub target_column: String,
    /// Directory receiving `scored_data_<timestamp>.csv`
    pub scored_data: PathBuf,
}

/// Outcome of a scoring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringReport {
    pub output_path: PathBuf,
    pub model_name: String,
    pub model_version: String,
    pub rows_scored: usize,
    pub background_rows: usize,
    pub base_value: f64,
    pub local_accuracy_gap: f64,
    pub summary: AttributionSummary,
}

/// Predicts a batch with a registered model and explains every row
pub struct ScoringJob<'a> {
    registry: &'a dyn ModelRegistry,
    config: ScoringConfig,
}

impl<'a> ScoringJob<'a> {
    pub fn new(registry: &'a dyn ModelRegistry, config: ScoringConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn run(&self, request: &ScoringRequest) -> Result<ScoringReport> {
        self.config.validate()?;
        let start = Instant::now();
        let target = request.target_column.as_str();

        // Background comes from the train side of the same split Job 1 made
        let training = ScoringBatchLoader::new()
            .with_target_column(target)
            .load_path(&request.training_data)?;
        let (train, _) = DatasetSplitter::with_config(self.config.split.clone()).split(&training)?;
        let background = BackgroundSample::draw(
            &train,
            self.config.background_size,
            self.config.background_seed,
        )?;
        info!(
            training_rows = training.height(),
            train_rows = train.height(),
            background_rows = background.len(),
            "Prepared background sample"
        );

        let model = ModelScorer::load_named(self.registry, &request.model_name)?;

        let scoring = load_scoring_batch(&request.scoring_data, target)?;
        let predictions = ModelScorer::predict(&model, &scoring)?;

        // Columns the model does not read stay in the matrix with zero credit
        let features = column_names(&scoring);
        let layout = model.layout_for(&features)?;
        let instances = to_input_matrix(&scoring, &features, model.feature_names())?;
        let reference = background.to_matrix(&features, model.feature_names())?;
        debug!(features = ?features, "Explaining feature columns");

        let explainer = LocalExplainer::new(|x| model.predict_matrix(x, &layout), reference)
            .with_config(self.config.explainer.clone())
            .with_feature_names(features);
        let attributions = explainer.explain_batch(&instances)?;

        let assembler = ResultAssembler::new(target);
        let mut result = assembler.assemble(&scoring, &predictions, &attributions)?;
        let output_path = assembler.write(&mut result, &request.scored_data)?;

        let summary = attributions.summary();
        for (rank, (feature, importance)) in summary.feature_ranking().iter().enumerate() {
            info!(rank = rank + 1, feature = *feature, mean_abs = importance, "Feature attribution");
        }

        info!(
            model = %request.model_name,
            rows = scoring.height(),
            output = %output_path.display(),
            elapsed = ?start.elapsed(),
            "Scoring complete"
        );

        Ok(ScoringReport {
            output_path,
            model_name: model.metadata().name.clone(),
            model_version: model.metadata().version.clone(),
            rows_scored: scoring.height(),
            background_rows: background.len(),
            base_value: attributions.base_value(),
            local_accuracy_gap: attributions.local_accuracy_gap(),
            summary,
        })
    }
}

fn load_scoring_batch(path: &Path, target: &str) -> Result<polars::prelude::DataFrame> {
    ScoringBatchLoader::new()
        .with_target_column(target)
        .load_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoringError;
    use crate::export::{LocalModelRegistry, ModelVersion};
    use crate::inference::{ModelArtifact, ModelMetadata, RegressionModel};
    use crate::utils::{read_csv, write_csv};
    use polars::prelude::*;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        registry: LocalModelRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let mut registry = LocalModelRegistry::open(dir.path().join("registry")).unwrap();
            let artifact = ModelArtifact::new(
                ModelMetadata::new("adder", vec!["a".to_string(), "b".to_string()]).with_target("y"),
                RegressionModel::Linear {
                    coefficients: vec![2.0, -1.0],
                    intercept: 0.5,
                },
            );
            registry.register("adder", ModelVersion::new(1, 0, 0), &artifact).unwrap();

            let train_dir = dir.path().join("train");
            let score_dir = dir.path().join("score");
            std::fs::create_dir_all(&train_dir).unwrap();
            std::fs::create_dir_all(&score_dir).unwrap();

            let a: Vec<f64> = (0..40).map(|i| i as f64).collect();
            let b: Vec<f64> = (0..40).map(|i| (i % 7) as f64).collect();
            let y: Vec<f64> = a.iter().zip(&b).map(|(a, b)| 2.0 * a - b + 0.5).collect();
            let mut train = df!("a" => &a, "b" => &b, "y" => &y).unwrap();
            write_csv(&mut train, &train_dir.join("train_data.csv")).unwrap();

            let mut batch = df!("a" => &[1.0, 10.0, 3.0], "b" => &[2.0, 0.0, 6.0]).unwrap();
            write_csv(&mut batch, &score_dir.join("batch.csv")).unwrap();

            Self { dir, registry }
        }

        fn request(&self, model: &str) -> ScoringRequest {
            ScoringRequest {
                training_data: self.dir.path().join("train"),
                scoring_data: self.dir.path().join("score"),
                model_name: model.to_string(),
                target_column: "y".to_string(),
                scored_data: self.dir.path().join("out"),
            }
        }
    }

    #[test]
    fn test_run_writes_scored_output() {
        let fixture = Fixture::new();
        let config = ScoringConfig::new().with_background_size(20).with_n_permutations(2);
        let report = ScoringJob::new(&fixture.registry, config)
            .run(&fixture.request("adder"))
            .unwrap();

        assert_eq!(report.rows_scored, 3);
        assert_eq!(report.background_rows, 20);
        assert_eq!(report.model_version, "1.0.0");
        assert!(report.local_accuracy_gap < 1e-9);

        let scored = read_csv(&report.output_path).unwrap();
        assert_eq!(
            column_names(&scored),
            vec!["a", "b", "PREDICTED_y", "a_SHAP", "b_SHAP"]
        );
        let preds: Vec<f64> = scored
            .column("PREDICTED_y")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(preds, vec![0.5, 20.5, 0.5]);
    }

    #[test]
    fn test_unknown_model() {
        let fixture = Fixture::new();
        let err = ScoringJob::new(&fixture.registry, ScoringConfig::default())
            .run(&fixture.request("missing"))
            .unwrap_err();
        assert!(matches!(err, ScoringError::ModelNotFound(_)));
        assert!(!fixture.dir.path().join("out").exists());
    }

    #[test]
    fn test_text_id_column_gets_zero_attribution() {
        let fixture = Fixture::new();
        let train_dir = fixture.dir.path().join("train");
        let score_dir = fixture.dir.path().join("score");

        let ids: Vec<String> = (0..40).map(|i| format!("row-{}", i)).collect();
        let a: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..40).map(|i| (i % 5) as f64).collect();
        let y: Vec<f64> = a.iter().zip(&b).map(|(a, b)| 2.0 * a - b + 0.5).collect();
        let mut train = df!("id" => &ids, "a" => &a, "b" => &b, "y" => &y).unwrap();
        write_csv(&mut train, &train_dir.join("train_data.csv")).unwrap();

        let mut batch = df!(
            "id" => &["s-1", "s-2"],
            "a" => &[4.0, 8.0],
            "b" => &[1.0, 3.0]
        )
        .unwrap();
        write_csv(&mut batch, &score_dir.join("batch.csv")).unwrap();

        let config = ScoringConfig::new().with_background_size(10).with_n_permutations(3);
        let report = ScoringJob::new(&fixture.registry, config)
            .run(&fixture.request("adder"))
            .unwrap();
        assert!(report.local_accuracy_gap < 1e-9);

        let scored = read_csv(&report.output_path).unwrap();
        assert_eq!(
            column_names(&scored),
            vec!["id", "a", "b", "PREDICTED_y", "id_SHAP", "a_SHAP", "b_SHAP"]
        );
        let id_credit: Vec<f64> = scored
            .column("id_SHAP")
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(id_credit, vec![0.0, 0.0]);
        let preds: Vec<f64> = scored
            .column("PREDICTED_y")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(preds, vec![7.5, 13.5]);
    }

    #[test]
    fn test_scoring_batch_missing_feature() {
        let fixture = Fixture::new();
        let score_dir = fixture.dir.path().join("score");
        let mut bad = df!("a" => &[1.0]).unwrap();
        std::fs::remove_file(score_dir.join("batch.csv")).unwrap();
        write_csv(&mut bad, &score_dir.join("batch.csv")).unwrap();

        let err = ScoringJob::new(&fixture.registry, ScoringConfig::default())
            .run(&fixture.request("adder"))
            .unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch(_)));
    }
}
