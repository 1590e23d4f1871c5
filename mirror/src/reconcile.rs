//! Reconciliation of a source and a destination snapshot into copy and delete work

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scanner::DirectorySnapshot;

/// Paths to process, each mapped to its companion path.
///
/// For copies the companion is the destination; deletes carry no companion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSet {
    entries: HashMap<PathBuf, Option<PathBuf>>,
}

impl WorkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a copy of `source` to `destination`
    pub fn insert_copy(&mut self, source: PathBuf, destination: PathBuf) {
        self.entries.insert(source, Some(destination));
    }

    /// Add a deletion of `path`
    pub fn insert_delete(&mut self, path: PathBuf) {
        self.entries.insert(path, None);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Companion path recorded for `path`
    pub fn companion(&self, path: &Path) -> Option<&Path> {
        self.entries.get(path).and_then(|companion| companion.as_deref())
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }
}

impl IntoIterator for WorkSet {
    type Item = (PathBuf, Option<PathBuf>);
    type IntoIter = std::collections::hash_map::IntoIter<PathBuf, Option<PathBuf>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Work computed for one sync run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Source path to destination path
    pub copies: WorkSet,
    /// Destination paths absent from the source
    pub deletes: WorkSet,
    /// Bytes the copy set will transfer
    pub bytes_to_copy: u64,
}

impl SyncPlan {
    pub fn total_tasks(&self) -> usize {
        self.copies.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty() && self.deletes.is_empty()
    }
}

/// Map a path under `source_root` to the same relative location under `dest_root`.
///
/// Returns `None` when `path` does not live under `source_root`.
pub fn destination_path(path: &Path, source_root: &Path, dest_root: &Path) -> Option<PathBuf> {
    path.strip_prefix(source_root)
        .ok()
        .map(|relative| dest_root.join(relative))
}

/// Compare two snapshots by path correspondence and size.
///
/// A source file is copied when the destination has no file at the
/// corresponding path or the sizes differ. Destination files with no source
/// counterpart are deleted. Equal sizes are treated as identical content.
pub fn reconcile(
    source: DirectorySnapshot,
    destination: DirectorySnapshot,
    source_root: &Path,
    dest_root: &Path,
) -> SyncPlan {
    let mut remaining = destination.into_files();
    let mut plan = SyncPlan::default();

    for (path, record) in source.iter() {
        let Some(dest_path) = destination_path(path, source_root, dest_root) else {
            warn!(
                "Skipping '{}': not under source root '{}'",
                path.display(),
                source_root.display()
            );
            continue;
        };

        // Claim the destination entry whether or not it matches, so a
        // size-mismatched file is overwritten and never also deleted
        let unchanged = remaining
            .remove(&dest_path)
            .is_some_and(|existing| existing.size == record.size);

        if !unchanged {
            plan.bytes_to_copy += record.size;
            plan.copies.insert_copy(path.clone(), dest_path);
        }
    }

    for path in remaining.into_keys() {
        plan.deletes.insert_delete(path);
    }

    plan
}
