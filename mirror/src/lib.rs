//! Mirror Engine Library
//!
//! One-way directory mirroring:
//! - Recursive scanning into size snapshots
//! - Reconciliation into copy and delete work sets
//! - Concurrent copy and delete pipelines over a fixed-size worker pool
//! - Pruning of directories left empty in the destination

pub mod scanner;
pub mod reconcile;
pub mod operations;
pub mod pipeline;
pub mod prune;
pub mod sync_engine;
pub mod options;
pub mod error;

// Re-export main types and functions
pub use scanner::{scan_directory, DirectorySnapshot, FileRecord};
pub use reconcile::{reconcile, SyncPlan, WorkSet};
pub use operations::{CopyOperation, DeleteOperation, OperationKind, SyncTask, TaskOperation};
pub use pipeline::{dispatch, run_pipeline, run_workers, PipelineReport, TaskFailure};
pub use prune::{prune_empty_dirs, PruneStats};
pub use sync_engine::{sync_folder, SyncEngine, SyncReport};
pub use options::{SyncOptions, DEFAULT_BUFFER_SIZE, DEFAULT_WORKERS};
pub use error::{Result, SyncError};

// Test modules
#[cfg(test)]
mod reconcile_tests;
