//! Inference module
//!
//! Loads regression model artifacts and scores frames with them:
//! - JSON artifacts with metadata and a linear or tree-ensemble model
//! - Structural validation on load
//! - Schema checks on prediction (missing columns fail, extra columns are ignored)
//! - Matrix prediction with a column layout for the attribution engine

mod model;
mod scorer;

pub use model::{
    FeatureLayout, LoadedModel, ModelArtifact, ModelMetadata, RegressionModel, RegressionTree,
    TreeNode,
};
pub use scorer::ModelScorer;
