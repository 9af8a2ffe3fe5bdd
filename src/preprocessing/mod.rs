//! Dataset preparation
//!
//! Seeded train/test partitioning of tabular data and the table
//! descriptors written next to each partition.

mod schema;
mod split;

pub use schema::{TableDescriptor, DESCRIPTOR_FILE_NAME};
pub use split::{take_rows, DatasetSplitter, SplitConfig, SplitIndices};
