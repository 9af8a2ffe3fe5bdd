//! Scored result assembly and atomic output

use crate::error::{Result, ScoringError};
use crate::explainability::AttributionMatrix;
use crate::utils::{column_names, write_csv_to};
use chrono::{DateTime, Duration, Utc};
use ndarray::Array1;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix appended to a feature name for its attribution column
pub const ATTRIBUTION_SUFFIX: &str = "_SHAP";

/// Prefix of the prediction column
pub const PREDICTION_PREFIX: &str = "PREDICTED_";

/// Timestamp layout embedded in output file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Attempts at finding a free timestamped name before giving up
const MAX_NAME_ATTEMPTS: i64 = 3600;

/// Name of the prediction column for `target`
pub fn prediction_column(target: &str) -> String {
    format!("{}{}", PREDICTION_PREFIX, target)
}

/// Name of the attribution column for `feature`
pub fn attribution_column(feature: &str) -> String {
    format!("{}{}", feature, ATTRIBUTION_SUFFIX)
}

/// `scored_data_<timestamp>.csv`
pub fn output_file_name(at: DateTime<Utc>) -> String {
    format!("scored_data_{}.csv", at.format(TIMESTAMP_FORMAT))
}

/// Appends predictions and attributions to a scoring frame and persists it
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    target_column: String,
}

impl ResultAssembler {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    /// Scoring frame + prediction column + one attribution column per feature
    pub fn assemble(
        &self,
        scoring: &DataFrame,
        predictions: &Array1<f64>,
        attributions: &AttributionMatrix,
    ) -> Result<DataFrame> {
        let n_rows = scoring.height();
        if predictions.len() != n_rows || attributions.nrows() != n_rows {
            return Err(ScoringError::SchemaMismatch(format!(
                "row counts differ: {} scored rows, {} predictions, {} attribution rows",
                n_rows,
                predictions.len(),
                attributions.nrows()
            )));
        }

        let existing = column_names(scoring);
        let missing: Vec<&String> = attributions
            .feature_names()
            .iter()
            .filter(|f| !existing.contains(f))
            .collect();
        if !missing.is_empty() {
            return Err(ScoringError::SchemaMismatch(format!(
                "attributions reference unknown columns {:?}",
                missing
            )));
        }

        let mut new_columns = Vec::with_capacity(attributions.feature_names().len() + 1);
        new_columns.push(Column::new(
            prediction_column(&self.target_column).into(),
            predictions.to_vec(),
        ));
        for (j, feature) in attributions.feature_names().iter().enumerate() {
            new_columns.push(Column::new(
                attribution_column(feature).into(),
                attributions.column(j).to_vec(),
            ));
        }

        let mut result = scoring.clone();
        for column in new_columns {
            if existing.iter().any(|c| c.as_str() == column.name().as_str()) {
                return Err(ScoringError::SchemaMismatch(format!(
                    "output column '{}' already exists in the scoring data",
                    column.name()
                )));
            }
            result.with_column(column)?;
        }

        Ok(result)
    }

    /// Write `result` into `out_dir` under a fresh timestamped name
    pub fn write(&self, result: &mut DataFrame, out_dir: &Path) -> Result<PathBuf> {
        self.write_at(result, out_dir, Utc::now())
    }

    /// Write with an explicit generation time.
    ///
    /// The CSV goes to a temporary file in `out_dir` first and is renamed
    /// without clobbering; a taken name moves the timestamp forward a second.
    pub fn write_at(
        &self,
        result: &mut DataFrame,
        out_dir: &Path,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let write_err = |path: &Path, reason: String| ScoringError::OutputWrite {
            path: path.display().to_string(),
            reason,
        };

        fs::create_dir_all(out_dir).map_err(|e| write_err(out_dir, e.to_string()))?;

        let mut staged = tempfile::Builder::new()
            .prefix(".scored_data_")
            .suffix(".csv.tmp")
            .tempfile_in(out_dir)
            .map_err(|e| write_err(out_dir, e.to_string()))?;
        write_csv_to(result, staged.as_file_mut())
            .map_err(|e| write_err(staged.path(), e.to_string()))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| write_err(staged.path(), e.to_string()))?;

        for offset in 0..MAX_NAME_ATTEMPTS {
            let target = out_dir.join(output_file_name(at + Duration::seconds(offset)));
            match staged.persist_noclobber(&target) {
                Ok(_) => {
                    info!(
                        path = %target.display(),
                        rows = result.height(),
                        cols = result.width(),
                        "Wrote scored data"
                    );
                    return Ok(target);
                }
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    staged = e.file;
                }
                Err(e) => return Err(write_err(&target, e.error.to_string())),
            }
        }

        Err(write_err(
            out_dir,
            format!("no free output name within {} seconds of {}", MAX_NAME_ATTEMPTS, at),
        ))
    }
}
