//! Job 1: partition a raw dataset into train and test tables

use crate::error::{Result, ScoringError};
use crate::preprocessing::{DatasetSplitter, SplitConfig, TableDescriptor};
use crate::preprocessing::DESCRIPTOR_FILE_NAME;
use crate::utils::{write_csv_to, ScoringBatchLoader};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub const TRAIN_FILE_NAME: &str = "train_data.csv";
pub const TEST_FILE_NAME: &str = "test_data.csv";

/// Outcome of a preprocessing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub source_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

/// Splits a raw CSV dataset and writes both partitions with descriptors
#[derive(Debug, Clone, Default)]
pub struct PreprocessJob {
    config: SplitConfig,
}

impl PreprocessJob {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Read `raw_dataset` (file or directory), split it and write
    /// `train_data.csv` into `train_dir` and `test_data.csv` into `test_dir`
    pub fn run(&self, raw_dataset: &Path, train_dir: &Path, test_dir: &Path) -> Result<PreprocessReport> {
        let start = Instant::now();
        let df = ScoringBatchLoader::new().load_path(raw_dataset)?;
        info!(path = %raw_dataset.display(), rows = df.height(), cols = df.width(), "Loaded raw dataset");

        let splitter = DatasetSplitter::with_config(self.config.clone());
        let (mut train, mut test) = splitter.split(&df)?;

        // Nothing becomes visible until both partitions are fully staged
        let staged_train = StagedPartition::stage(&mut train, train_dir, TRAIN_FILE_NAME)?;
        let staged_test = StagedPartition::stage(&mut test, test_dir, TEST_FILE_NAME)?;
        let train_path = staged_train.data_path.clone();
        let test_path = staged_test.data_path.clone();
        commit(vec![staged_train, staged_test])?;

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            elapsed = ?start.elapsed(),
            "Preprocessing complete"
        );

        Ok(PreprocessReport {
            source_rows: df.height(),
            train_rows: train.height(),
            test_rows: test.height(),
            train_path,
            test_path,
        })
    }
}

fn write_err(path: &Path, reason: impl ToString) -> ScoringError {
    ScoringError::OutputWrite {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// A partition and its descriptor written to temporary files in the target
/// directory, awaiting rename
struct StagedPartition {
    data: NamedTempFile,
    data_path: PathBuf,
    descriptor: NamedTempFile,
    descriptor_path: PathBuf,
    rows: usize,
}

impl StagedPartition {
    fn stage(df: &mut DataFrame, dir: &Path, file_name: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| write_err(dir, e))?;

        let data_path = dir.join(file_name);
        let mut data = NamedTempFile::new_in(dir).map_err(|e| write_err(dir, e))?;
        write_csv_to(df, data.as_file_mut()).map_err(|e| write_err(&data_path, e))?;
        data.as_file().sync_all().map_err(|e| write_err(&data_path, e))?;

        let descriptor_path = dir.join(DESCRIPTOR_FILE_NAME);
        let mut descriptor = NamedTempFile::new_in(dir).map_err(|e| write_err(dir, e))?;
        descriptor
            .write_all(TableDescriptor::for_csv(file_name).render().as_bytes())
            .map_err(|e| write_err(&descriptor_path, e))?;

        Ok(Self {
            data,
            data_path,
            descriptor,
            descriptor_path,
            rows: df.height(),
        })
    }
}

/// Rename every staged file into place; on failure remove what was renamed
fn commit(partitions: Vec<StagedPartition>) -> Result<()> {
    let mut persisted: Vec<PathBuf> = Vec::new();
    let mut result = Ok(());

    'outer: for partition in partitions {
        let rows = partition.rows;
        for (file, path) in [
            (partition.data, partition.data_path.clone()),
            (partition.descriptor, partition.descriptor_path),
        ] {
            match file.persist(&path) {
                Ok(_) => persisted.push(path),
                Err(e) => {
                    result = Err(write_err(&path, e.error));
                    break 'outer;
                }
            }
        }
        info!(path = %partition.data_path.display(), rows, "Wrote partition");
    }

    if result.is_err() {
        for path in &persisted {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Could not remove partial output");
            }
        }
    }
    result
}
