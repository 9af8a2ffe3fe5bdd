//! Table descriptor (`MLTable`) written next to each partition
//!
//! The descriptor is a small YAML document naming the data files and how to
//! read them. Only the subset of the format produced here is understood when
//! reading one back.

use crate::error::{Result, ScoringError};
use polars::prelude::{CsvEncoding, CsvParseOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the descriptor inside a partition directory
pub const DESCRIPTOR_FILE_NAME: &str = "MLTable";

/// Declarative description of a delimited table on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Data files, relative to the descriptor's directory
    pub paths: Vec<String>,
    pub delimiter: char,
    pub encoding: String,
    /// Whether empty fields are read as empty strings rather than nulls
    pub empty_as_string: bool,
}

impl TableDescriptor {
    /// Descriptor for a single comma-delimited ASCII file
    pub fn for_csv(file_name: &str) -> Self {
        Self {
            paths: vec![format!("./{}", file_name)],
            delimiter: ',',
            encoding: "ascii".to_string(),
            empty_as_string: false,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("paths:\n");
        for path in &self.paths {
            out.push_str(&format!("  - file: {}\n", path));
        }
        out.push_str("transformations:\n");
        out.push_str("  - read_delimited:\n");
        out.push_str(&format!("      delimiter: '{}'\n", self.delimiter));
        out.push_str(&format!("      encoding: '{}'\n", self.encoding));
        out.push_str(&format!("      empty_as_string: {}\n", self.empty_as_string));
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut paths = Vec::new();
        let mut delimiter = ',';
        let mut encoding = "utf8".to_string();
        let mut empty_as_string = false;

        for line in text.lines() {
            let line = line.trim().trim_start_matches("- ").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().trim_matches('\'').trim_matches('"');
            match key.trim() {
                "file" => paths.push(value.to_string()),
                "delimiter" => {
                    delimiter = value.chars().next().ok_or_else(|| {
                        ScoringError::SerializationError("empty delimiter in descriptor".to_string())
                    })?;
                    check_delimiter(delimiter)?;
                }
                "encoding" => encoding = value.to_string(),
                "empty_as_string" => {
                    empty_as_string = value.parse().map_err(|_| {
                        ScoringError::SerializationError(format!(
                            "invalid empty_as_string value: {}",
                            value
                        ))
                    })?;
                }
                _ => {}
            }
        }

        if paths.is_empty() {
            return Err(ScoringError::SerializationError(
                "descriptor lists no data files".to_string(),
            ));
        }

        Ok(Self {
            paths,
            delimiter,
            encoding,
            empty_as_string,
        })
    }

    /// Polars parse options equivalent to the `read_delimited` step
    pub fn parse_options(&self) -> Result<CsvParseOptions> {
        check_delimiter(self.delimiter)?;
        let encoding = match self.encoding.to_ascii_lowercase().as_str() {
            "ascii" | "utf8" | "utf-8" => CsvEncoding::Utf8,
            other => {
                return Err(ScoringError::SerializationError(format!(
                    "unsupported descriptor encoding '{}'",
                    other
                )))
            }
        };

        Ok(CsvParseOptions::default()
            .with_separator(self.delimiter as u8)
            .with_encoding(encoding)
            .with_missing_is_null(!self.empty_as_string))
    }

    /// Read the descriptor in `dir`, if there is one
    pub fn read_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(DESCRIPTOR_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Self::parse(&text).map(Some)
    }

    /// Data file paths resolved against `dir`
    pub fn resolve_paths(&self, dir: &Path) -> Vec<PathBuf> {
        self.paths
            .iter()
            .map(|p| dir.join(p.trim_start_matches("./")))
            .collect()
    }
}

fn check_delimiter(delimiter: char) -> Result<()> {
    if delimiter.is_ascii() {
        Ok(())
    } else {
        Err(ScoringError::SerializationError(format!(
            "delimiter '{}' is not a single ASCII character",
            delimiter
        )))
    }
}
