//! File operations applied by pipeline workers

use std::io::ErrorKind;
use std::path::PathBuf;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::options::DEFAULT_BUFFER_SIZE;

/// A single unit of work handed to one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTask {
    /// File to read from (copy) or remove (delete)
    pub source: PathBuf,
    /// Copy target; unused by deletes
    pub destination: Option<PathBuf>,
}

impl SyncTask {
    pub fn copy(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: Some(destination.into()),
        }
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self {
            source: path.into(),
            destination: None,
        }
    }
}

/// Kind of pipeline a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Copy,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Operation a worker applies to each task it pulls
#[async_trait]
pub trait TaskOperation: Send + Sync {
    fn kind(&self) -> OperationKind;

    async fn apply(&self, task: &SyncTask) -> Result<()>;
}

/// Streams a source file into its destination through a fixed-size buffer
#[derive(Debug, Clone)]
pub struct CopyOperation {
    buffer_size: usize,
}

impl Default for CopyOperation {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl CopyOperation {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[async_trait]
impl TaskOperation for CopyOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Copy
    }

    async fn apply(&self, task: &SyncTask) -> Result<()> {
        let source = &task.source;
        let Some(destination) = task.destination.as_ref() else {
            return Err(SyncError::copy_error(source, "", "Copy task has no destination"));
        };

        let mut reader = match fs::File::open(source).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Removed between scan and copy
                debug!("Source '{}' disappeared, nothing to copy", source.display());
                return Ok(());
            }
            Err(e) => {
                return Err(SyncError::from_copy_io(source, destination, "Failed to open source", e));
            }
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::from_copy_io(source, destination, "Failed to create parent directory", e)
            })?;
        }

        let mut writer = fs::File::create(destination).await.map_err(|e| {
            SyncError::from_copy_io(source, destination, "Failed to create destination", e)
        })?;

        let mut buffer = vec![0u8; self.buffer_size];
        let mut copied: u64 = 0;
        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
                SyncError::from_copy_io(source, destination, "Failed to read source", e)
            })?;

            if bytes_read == 0 {
                break;
            }

            writer.write_all(&buffer[..bytes_read]).await.map_err(|e| {
                SyncError::from_copy_io(source, destination, "Failed to write destination", e)
            })?;
            copied += bytes_read as u64;
        }

        writer.flush().await.map_err(|e| {
            SyncError::from_copy_io(source, destination, "Failed to flush destination", e)
        })?;

        debug!("Copied '{}' -> '{}' ({} bytes)", source.display(), destination.display(), copied);
        Ok(())
    }
}

/// Removes the task's source path
#[derive(Debug, Clone, Default)]
pub struct DeleteOperation;

#[async_trait]
impl TaskOperation for DeleteOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Delete
    }

    async fn apply(&self, task: &SyncTask) -> Result<()> {
        // Not-found is a failure here: the path came from a scan moments ago
        fs::remove_file(&task.source)
            .await
            .map_err(|e| SyncError::from_delete_io(&task.source, e))?;

        debug!("Deleted '{}'", task.source.display());
        Ok(())
    }
}
