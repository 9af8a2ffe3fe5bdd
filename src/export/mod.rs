//! Model lookup and scored-output persistence
//!
//! - Directory-backed model registry with semantic versions
//! - Model URIs resolved to local artifact paths
//! - Assembly of scored frames and atomic, timestamped CSV output

mod registry;
mod writer;

pub use registry::{
    LocalModelRegistry, ModelRegistry, ModelUri, ModelVersion, RegistryEntry, RegistryIndex,
};
pub use writer::{
    attribution_column, output_file_name, prediction_column, ResultAssembler,
    ATTRIBUTION_SUFFIX, PREDICTION_PREFIX, TIMESTAMP_FORMAT,
};
