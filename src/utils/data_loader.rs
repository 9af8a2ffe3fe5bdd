//! Data loading utilities

use crate::error::{Result, ScoringError};
use crate::preprocessing::TableDescriptor;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read a single CSV file with a header row
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    read_csv_with_options(path, CsvParseOptions::default())
}

/// Read a CSV file with explicit delimiter, encoding and null handling
pub fn read_csv_with_options(path: &Path, parse_opts: CsvParseOptions) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| ScoringError::DataError(format!("{}: {}", path.display(), e)))?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .with_parse_options(parse_opts)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| ScoringError::DataError(format!("{}: {}", path.display(), e)))
}

/// CSV files directly inside `dir`, sorted by file name
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ScoringError::DataError(format!("{}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_csv(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Column names of a frame, in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Remove `target` from `df` if present.
///
/// Absence is a no-op: scoring-only batches usually carry no target.
pub fn drop_target(df: DataFrame, target: &str) -> Result<DataFrame> {
    if df.get_column_index(target).is_some() {
        debug!(column = target, "Dropping target column");
        Ok(df.drop(target)?)
    } else {
        debug!(column = target, "Target column absent, nothing to drop");
        Ok(df)
    }
}

/// Assembles a scoring frame from one or more partition files
#[derive(Debug, Clone, Default)]
pub struct ScoringBatchLoader {
    target_column: Option<String>,
}

impl ScoringBatchLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column removed from the loaded batch when present
    pub fn with_target_column(mut self, target: impl Into<String>) -> Self {
        self.target_column = Some(target.into());
        self
    }

    /// Load and concatenate every CSV file in `dir`
    pub fn load_dir(&self, dir: &Path) -> Result<DataFrame> {
        let files = list_csv_files(dir)?;
        if files.is_empty() {
            return Err(ScoringError::EmptyDataset(format!(
                "no CSV files found in {}",
                dir.display()
            )));
        }
        self.load_files(&files)
    }

    /// Load a file, a descriptor directory, or a plain directory of CSV files
    pub fn load_path(&self, path: &Path) -> Result<DataFrame> {
        if path.is_dir() {
            match TableDescriptor::read_from(path)? {
                Some(descriptor) => {
                    debug!(dir = %path.display(), "Reading table through descriptor");
                    let parse_opts = descriptor.parse_options()?;
                    let files = descriptor.resolve_paths(path);
                    self.load_files_with_options(&files, parse_opts)
                }
                None => self.load_dir(path),
            }
        } else {
            self.load_files(&[path.to_path_buf()])
        }
    }

    /// Concatenate `files` in the given order
    pub fn load_files(&self, files: &[PathBuf]) -> Result<DataFrame> {
        self.load_files_with_options(files, CsvParseOptions::default())
    }

    fn load_files_with_options(
        &self,
        files: &[PathBuf],
        parse_opts: CsvParseOptions,
    ) -> Result<DataFrame> {
        let mut frames: Vec<DataFrame> = Vec::with_capacity(files.len());
        let mut expected: Vec<String> = Vec::new();

        for file in files {
            let df = read_csv_with_options(file, parse_opts.clone())?;
            debug!(file = %file.display(), rows = df.height(), cols = df.width(), "Loaded file");

            if frames.is_empty() {
                expected = column_names(&df);
                frames.push(df);
                continue;
            }

            let found = column_names(&df);
            let expected_set: BTreeSet<&String> = expected.iter().collect();
            let found_set: BTreeSet<&String> = found.iter().collect();
            if expected_set != found_set {
                return Err(ScoringError::SchemaMismatch(format!(
                    "{} has columns {:?}, expected {:?}",
                    file.display(),
                    found,
                    expected
                )));
            }
            frames.push(df.select(expected.iter().map(|s| s.as_str()))?);
        }

        let mut combined: Option<DataFrame> = None;
        for (df, file) in unify_dtypes(frames, &expected)?.into_iter().zip(files) {
            match combined.as_mut() {
                None => combined = Some(df),
                Some(acc) => {
                    acc.vstack_mut(&df).map_err(|e| {
                        ScoringError::DataError(format!("{}: {}", file.display(), e))
                    })?;
                }
            }
        }

        let mut df = combined.ok_or_else(|| {
            ScoringError::EmptyDataset("no input files to load".to_string())
        })?;
        df.align_chunks();

        let df = match &self.target_column {
            Some(target) => drop_target(df, target)?,
            None => df,
        };

        info!(files = files.len(), rows = df.height(), cols = df.width(), "Loaded scoring batch");
        Ok(df)
    }
}

/// Dtype a column is read as for stacking; all-null columns adapt to the rest
fn stacking_dtype(column: &Column) -> DataType {
    if column.null_count() == column.len() {
        DataType::Null
    } else {
        column.dtype().clone()
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_integer() || dtype.is_float() || dtype.is_bool()
}

/// Smallest dtype both sides cast to without losing values
fn common_dtype(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        _ if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        _ if a.is_integer() && b.is_integer() => DataType::Int64,
        _ if is_numeric(a) && is_numeric(b) => DataType::Float64,
        _ => DataType::String,
    }
}

/// Cast every frame's columns to the dtype shared across all files
fn unify_dtypes(frames: Vec<DataFrame>, columns: &[String]) -> Result<Vec<DataFrame>> {
    let mut targets: Vec<DataType> = Vec::with_capacity(columns.len());
    for name in columns {
        let mut target = DataType::Null;
        for df in &frames {
            target = common_dtype(&target, &stacking_dtype(df.column(name)?));
        }
        // Empty in every file: keep the first file's dtype
        if target == DataType::Null {
            if let Some(first) = frames.first() {
                target = first.column(name)?.dtype().clone();
            }
        }
        targets.push(target);
    }

    frames
        .into_iter()
        .map(|df| {
            if columns
                .iter()
                .zip(&targets)
                .all(|(name, dtype)| df.column(name).map(|c| c.dtype() == dtype).unwrap_or(false))
            {
                return Ok(df);
            }
            let cast = columns
                .iter()
                .zip(&targets)
                .map(|(name, dtype)| Ok(df.column(name)?.cast(dtype)?))
                .collect::<Result<Vec<Column>>>()?;
            Ok(DataFrame::new(cast)?)
        })
        .collect()
}

/// Save a frame as CSV with a header row
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|e| ScoringError::OutputWrite {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    write_csv_to(df, &mut file).map_err(|e| ScoringError::OutputWrite {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Serialize a frame as CSV into any writer
pub fn write_csv_to<W: std::io::Write>(df: &mut DataFrame, writer: &mut W) -> Result<()> {
    CsvWriter::new(writer)
        .include_header(true)
        .finish(df)
        .map_err(|e| ScoringError::DataError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, lines: &[&str]) {
        let mut file = File::create(dir.join(name)).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_load_dir_concatenates_in_name_order() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "b.csv", &["a,b,c", "4,5,6"]);
        write_file(dir.path(), "a.csv", &["a,b,c", "1,2,3", "7,8,9"]);
        write_file(dir.path(), "notes.txt", &["ignored"]);

        let df = ScoringBatchLoader::new().load_dir(dir.path()).unwrap();
        assert_eq!(column_names(&df), vec!["a", "b", "c"]);
        assert_eq!(df.height(), 3);

        let a: Vec<i64> = df
            .column("a")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(a, vec![1, 7, 4]);
    }

    #[test]
    fn test_load_dir_realigns_column_order() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "1.csv", &["a,b", "1,2"]);
        write_file(dir.path(), "2.csv", &["b,a", "20,10"]);

        let df = ScoringBatchLoader::new().load_dir(dir.path()).unwrap();
        assert_eq!(column_names(&df), vec!["a", "b"]);
        let b = df.column("b").unwrap().as_materialized_series().i64().unwrap().get(1);
        assert_eq!(b, Some(20));
    }

    #[test]
    fn test_load_dir_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "1.csv", &["a,b,c", "1,2,3"]);
        write_file(dir.path(), "2.csv", &["a,b,d", "1,2,3"]);

        let err = ScoringBatchLoader::new().load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch(_)));
    }

    #[test]
    fn test_load_dir_widens_mixed_numeric_columns() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.csv", &["x1,x2", "1,2", "3,4"]);
        write_file(dir.path(), "b.csv", &["x1,x2", "1.5,2", "3.5,4"]);

        let df = ScoringBatchLoader::new().load_dir(dir.path()).unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(df.column("x1").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("x2").unwrap().dtype(), &DataType::Int64);

        let x1: Vec<f64> = df
            .column("x1")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(x1, vec![1.0, 3.0, 1.5, 3.5]);
    }

    #[test]
    fn test_load_dir_accepts_column_empty_in_one_file() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.csv", &["x1,x2", "1,", "2,"]);
        write_file(dir.path(), "b.csv", &["x1,x2", "3,0.5"]);

        let df = ScoringBatchLoader::new().load_dir(dir.path()).unwrap();
        assert_eq!(df.height(), 3);
        let x2 = df.column("x2").unwrap();
        assert_eq!(x2.dtype(), &DataType::Float64);
        assert_eq!(x2.null_count(), 2);
    }

    #[test]
    fn test_load_dir_without_csv() {
        let dir = TempDir::new().unwrap();
        let err = ScoringBatchLoader::new().load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ScoringError::EmptyDataset(_)));
    }

    #[test]
    fn test_target_drop_is_idempotent() {
        let with_target = TempDir::new().unwrap();
        write_file(with_target.path(), "x.csv", &["a,b,y", "1,2,3", "4,5,6"]);
        let without_target = TempDir::new().unwrap();
        write_file(without_target.path(), "x.csv", &["a,b", "1,2", "4,5"]);

        let loader = ScoringBatchLoader::new().with_target_column("y");
        let first = loader.load_dir(with_target.path()).unwrap();
        let second = loader.load_dir(without_target.path()).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_load_path_through_descriptor() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "train_data.csv", &["a,b", "1,2"]);
        write_file(dir.path(), "stale.csv", &["a,b", "9,9"]);
        std::fs::write(
            dir.path().join(crate::preprocessing::DESCRIPTOR_FILE_NAME),
            TableDescriptor::for_csv("train_data.csv").render(),
        )
        .unwrap();

        let df = ScoringBatchLoader::new().load_path(dir.path()).unwrap();
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_write_csv_roundtrip_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!("a" => &[1.0, 2.0], "b" => &[3.0, 4.0]).unwrap();
        write_csv(&mut df, &path).unwrap();

        let loaded = read_csv(&path).unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.width(), 2);
    }
}
