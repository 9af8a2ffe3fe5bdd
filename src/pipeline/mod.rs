//! Batch jobs
//!
//! - [`PreprocessJob`]: split a raw dataset into train/test tables
//! - [`ScoringJob`]: predict a batch with a registered model and explain it

mod config;
mod preprocess;
mod scoring;

pub use config::ScoringConfig;
pub use preprocess::{PreprocessJob, PreprocessReport, TEST_FILE_NAME, TRAIN_FILE_NAME};
pub use scoring::{ScoringJob, ScoringReport, ScoringRequest};
