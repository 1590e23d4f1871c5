//! Directory scanning using walkdir

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SyncError};

/// Metadata recorded for each file found by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the scan root; the last component is the file name
    pub relative_path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileRecord {
    pub fn new(relative_path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            size,
        }
    }

    /// File name of the record
    pub fn name(&self) -> Option<&str> {
        self.relative_path.file_name().and_then(|name| name.to_str())
    }
}

/// Point-in-time view of the files under a directory, keyed by absolute path
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    root: PathBuf,
    files: HashMap<PathBuf, FileRecord>,
}

impl DirectorySnapshot {
    /// Empty snapshot rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
        }
    }

    /// Build a snapshot from already known records
    pub fn from_records(
        root: impl Into<PathBuf>,
        records: impl IntoIterator<Item = (PathBuf, FileRecord)>,
    ) -> Self {
        Self {
            root: root.into(),
            files: records.into_iter().collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileRecord)> {
        self.files.iter()
    }

    /// Total bytes across all recorded files
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|record| record.size).sum()
    }

    pub(crate) fn into_files(self) -> HashMap<PathBuf, FileRecord> {
        self.files
    }
}

/// Recursively scan `root` and record every non-directory entry.
///
/// Subdirectories that cannot be listed contribute nothing to the snapshot,
/// but a root that cannot be listed is an error.
/// The walk is blocking; async callers should run it on the blocking pool.
pub fn scan_directory(root: impl AsRef<Path>) -> Result<DirectorySnapshot> {
    let root = root.as_ref();

    let metadata = match fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SyncError::not_found(root));
        }
        Err(e) => {
            return Err(SyncError::scan_error(root, format!("Failed to read metadata: {}", e)));
        }
    };

    if !metadata.is_dir() {
        return Err(SyncError::scan_error(root, "Path is not a directory"));
    }

    // An unlistable root must fail the scan, not look like an empty tree
    fs::read_dir(root).map_err(|e| root_listing_error(root, e))?;

    let mut snapshot = DirectorySnapshot::new(root);

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let message = e.to_string();
                return Err(match e.into_io_error() {
                    Some(io_err) => root_listing_error(root, io_err),
                    None => SyncError::scan_error(root, message),
                });
            }
            Err(e) => {
                debug!("Skipping unreadable entry under '{}': {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        // Follow links so a linked file is recorded with the size a copy would produce
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) if !metadata.is_dir() => metadata,
            Ok(_) => continue,
            Err(e) => {
                debug!("Skipping '{}': {}", entry.path().display(), e);
                continue;
            }
        };

        let relative_path = match entry.path().strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        snapshot
            .files
            .insert(entry.path().to_path_buf(), FileRecord::new(relative_path, metadata.len()));
    }

    debug!("Scanned '{}': {} files", root.display(), snapshot.len());
    Ok(snapshot)
}

fn root_listing_error(root: &Path, err: std::io::Error) -> SyncError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        SyncError::permission_error(root, format!("Failed to list directory: {}", err))
    } else {
        SyncError::scan_error(root, format!("Failed to list directory: {}", err))
    }
}
