//! Model explainability module
//!
//! Provides per-row feature attributions for regression models:
//! - Background sampling from the training partition
//! - Permutation-sampling Shapley values with exact local accuracy
//! - Per-row explanations and global attribution summaries

mod background;
mod config;
mod local_explanations;

pub use background::BackgroundSample;
pub use config::ExplainerConfig;
pub use local_explanations::{
    AttributionMatrix, AttributionSummary, FeatureContribution, LocalExplainer, LocalExplanation,
    LOCAL_ACCURACY_TOLERANCE,
};
