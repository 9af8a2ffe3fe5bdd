//! Model versioning and registry
//!
//! Resolves a model name to the URI of its newest artifact. The local
//! registry keeps one JSON artifact per version under `<root>/<name>/` and an
//! `index.json` listing them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, ScoringError};
use crate::inference::ModelArtifact;

/// Location of a model artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelUri(String);

impl ModelUri {
    const FILE_SCHEME: &'static str = "file://";

    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(format!("{}{}", Self::FILE_SCHEME, path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path of the artifact; accepts `file://` URIs and bare paths
    pub fn to_path(&self) -> Result<PathBuf> {
        if let Some(rest) = self.0.strip_prefix(Self::FILE_SCHEME) {
            return Ok(PathBuf::from(rest));
        }
        match self.0.split_once("://") {
            Some((scheme, _)) => Err(ScoringError::ModelNotFound(format!(
                "unsupported URI scheme '{}' in {}",
                scheme, self.0
            ))),
            None => Ok(PathBuf::from(&self.0)),
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves model names to artifact URIs
pub trait ModelRegistry {
    fn resolve(&self, name: &str) -> Result<ModelUri>;
}

/// Semantic version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse from string (e.g., "1.2.3")
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().trim_start_matches('v').split('.').collect();
        if parts.len() != 3 {
            return Err(ScoringError::InvalidParameter {
                name: "version".to_string(),
                value: s.to_string(),
                reason: "expected MAJOR.MINOR.PATCH".to_string(),
            });
        }

        let component = |part: &str| -> Result<u32> {
            part.parse().map_err(|_| ScoringError::InvalidParameter {
                name: "version".to_string(),
                value: s.to_string(),
                reason: format!("'{}' is not a number", part),
            })
        };

        Ok(Self::new(
            component(parts[0])?,
            component(parts[1])?,
            component(parts[2])?,
        ))
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Model registry entry (metadata only, without model data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub version: ModelVersion,
    /// File path relative to registry root
    pub path: String,
    /// Registration timestamp (RFC 3339)
    pub registered_at: String,
}

/// Registry index
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryIndex {
    /// All models by name
    pub models: HashMap<String, Vec<RegistryEntry>>,
}

/// Directory-backed model registry
pub struct LocalModelRegistry {
    root: PathBuf,
    index: RegistryIndex,
}

impl LocalModelRegistry {
    const INDEX_FILE: &'static str = "index.json";

    /// Create or open registry at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        let index_path = root.join(Self::INDEX_FILE);
        let index = if index_path.exists() {
            let file = File::open(&index_path)?;
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                ScoringError::SerializationError(format!(
                    "Failed to read registry index {}: {}",
                    index_path.display(),
                    e
                ))
            })?
        } else {
            RegistryIndex::default()
        };

        debug!(root = %root.display(), models = index.models.len(), "Opened model registry");
        Ok(Self { root, index })
    }

    fn save_index(&self) -> Result<()> {
        let file = File::create(self.root.join(Self::INDEX_FILE))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.index)?;
        Ok(())
    }

    /// Store an artifact as the given version of `name`
    pub fn register(
        &mut self,
        name: &str,
        version: ModelVersion,
        artifact: &ModelArtifact,
    ) -> Result<ModelUri> {
        let model_dir = self.root.join(name);
        fs::create_dir_all(&model_dir)?;

        let file_name = format!("v{}.json", version);
        let relative_path = format!("{}/{}", name, file_name);
        let file = File::create(model_dir.join(&file_name))?;
        serde_json::to_writer_pretty(BufWriter::new(file), artifact)?;

        let entries = self.index.models.entry(name.to_string()).or_default();
        entries.retain(|e| e.version != version);
        entries.push(RegistryEntry {
            name: name.to_string(),
            version: version.clone(),
            path: relative_path.clone(),
            registered_at: chrono::Utc::now().to_rfc3339(),
        });

        self.save_index()?;
        info!(model = name, version = %version, "Registered model");

        Ok(ModelUri::from_path(&self.root.join(relative_path)))
    }

    /// Latest registered version of `name`
    pub fn latest(&self, name: &str) -> Option<&RegistryEntry> {
        self.index
            .models
            .get(name)
            .and_then(|entries| entries.iter().max_by(|a, b| a.version.cmp(&b.version)))
    }

    /// List versions of a model
    pub fn list_versions(&self, name: &str) -> Vec<ModelVersion> {
        self.index
            .models
            .get(name)
            .map(|entries| entries.iter().map(|e| e.version.clone()).collect())
            .unwrap_or_default()
    }
}

impl ModelRegistry for LocalModelRegistry {
    fn resolve(&self, name: &str) -> Result<ModelUri> {
        let entry = self.latest(name).ok_or_else(|| {
            ScoringError::ModelNotFound(format!(
                "'{}' is not registered in {}",
                name,
                self.root.display()
            ))
        })?;
        Ok(ModelUri::from_path(&self.root.join(&entry.path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ModelMetadata, RegressionModel};
    use tempfile::TempDir;

    fn artifact(intercept: f64) -> ModelArtifact {
        ModelArtifact::new(
            ModelMetadata::new("demand", vec!["x".to_string()]),
            RegressionModel::Linear {
                coefficients: vec![1.0],
                intercept,
            },
        )
    }

    #[test]
    fn test_version_parsing() {
        let v = ModelVersion::parse("1.2.3").unwrap();
        assert_eq!(v, ModelVersion::new(1, 2, 3));
        assert_eq!(ModelVersion::parse("v2.0.1").unwrap().to_string(), "2.0.1");
        assert!(ModelVersion::parse("1.2").is_err());
        assert!(ModelVersion::parse("1.x.3").is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(ModelVersion::new(1, 0, 0) < ModelVersion::new(1, 1, 0));
        assert!(ModelVersion::new(1, 9, 9) < ModelVersion::new(2, 0, 0));
        assert!(ModelVersion::new(1, 2, 10) > ModelVersion::new(1, 2, 9));
    }

    #[test]
    fn test_resolve_latest_version() {
        let dir = TempDir::new().unwrap();
        let mut registry = LocalModelRegistry::open(dir.path()).unwrap();
        registry
            .register("demand", ModelVersion::new(1, 10, 0), &artifact(1.0))
            .unwrap();
        registry
            .register("demand", ModelVersion::new(1, 2, 0), &artifact(2.0))
            .unwrap();

        let reopened = LocalModelRegistry::open(dir.path()).unwrap();
        let uri = reopened.resolve("demand").unwrap();
        assert!(uri.as_str().starts_with("file://"));
        assert!(uri.as_str().ends_with("demand/v1.10.0.json"));
        assert!(uri.to_path().unwrap().is_file());
        assert_eq!(reopened.list_versions("demand").len(), 2);
    }

    #[test]
    fn test_resolve_unknown_model() {
        let dir = TempDir::new().unwrap();
        let registry = LocalModelRegistry::open(dir.path()).unwrap();
        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(err, ScoringError::ModelNotFound(_)));
    }

    #[test]
    fn test_uri_to_path() {
        assert_eq!(
            ModelUri::new("file:///models/m.json").to_path().unwrap(),
            PathBuf::from("/models/m.json")
        );
        assert_eq!(
            ModelUri::new("models/m.json").to_path().unwrap(),
            PathBuf::from("models/m.json")
        );
        assert!(matches!(
            ModelUri::new("s3://bucket/m.json").to_path(),
            Err(ScoringError::ModelNotFound(_))
        ));
    }
}
