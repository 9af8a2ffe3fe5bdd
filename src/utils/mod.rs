//! Utility functions and types

mod frame;
mod parallel;
pub mod data_loader;

pub use data_loader::{
    column_names, drop_target, list_csv_files, read_csv, read_csv_with_options, write_csv,
    write_csv_to, ScoringBatchLoader,
};
pub use frame::{to_feature_matrix, to_input_matrix};
pub use parallel::{try_parallel_map, ParallelConfig};
