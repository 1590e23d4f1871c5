//! Tunable options for a sync run

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Default number of concurrent workers per pipeline
pub const DEFAULT_WORKERS: usize = 10;

/// Size of the intermediate buffer used when streaming a copy
pub const DEFAULT_BUFFER_SIZE: usize = 128_000;

/// Options for sync operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Workers in each of the copy and delete pools
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Buffer size for file copies
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl SyncOptions {
    /// Options with the given worker count and default buffer size
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Parse options from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let options: Self = toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("Invalid options file: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject option values the pipelines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SyncError::Config("workers must be > 0".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(SyncError::Config("buffer_size must be > 0".to_string()));
        }
        Ok(())
    }
}
