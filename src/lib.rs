//! Kolosal Scoring - Batch scoring with local feature attributions
//!
//! Two offline jobs over tabular CSV data:
//! - Preprocessing: a seeded train/test split written with table descriptors
//! - Scoring: a registered regression model predicts a held-out batch and
//!   every prediction is explained with permutation-sampled Shapley values
//!
//! # Modules
//!
//! - [`preprocessing`] - Train/test partitioning and table descriptors
//! - [`inference`] - Model artifacts, loading and prediction
//! - [`explainability`] - Background sampling and attribution engine
//! - [`export`] - Model registry and scored-output writer
//! - [`pipeline`] - The preprocessing and scoring jobs
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod preprocessing;
pub mod inference;
pub mod explainability;
pub mod export;

// Jobs
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, ScoringError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, ScoringError};

    // Preprocessing
    pub use crate::preprocessing::{DatasetSplitter, SplitConfig, TableDescriptor};

    // Inference
    pub use crate::inference::{LoadedModel, ModelArtifact, ModelMetadata, ModelScorer, RegressionModel};

    // Explainability
    pub use crate::explainability::{AttributionMatrix, BackgroundSample, ExplainerConfig, LocalExplainer};

    // Export
    pub use crate::export::{LocalModelRegistry, ModelRegistry, ModelUri, ModelVersion, ResultAssembler};

    // Jobs
    pub use crate::pipeline::{PreprocessJob, ScoringConfig, ScoringJob, ScoringRequest};

    // Utilities
    pub use crate::utils::{ParallelConfig, ScoringBatchLoader};
}
