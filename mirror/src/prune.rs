//! Removal of empty directories left behind in the destination

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Counts from one pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneStats {
    pub directories_visited: usize,
    pub directories_removed: usize,
}

/// Remove every directory under `root`, `root` included, that has no
/// entries at the moment it is visited.
///
/// This is a single top-down pass: a parent is visited before its children,
/// so a parent emptied by removing its last empty child is left in place.
/// A missing `root` is not an error.
pub fn prune_empty_dirs(root: impl AsRef<Path>) -> PruneStats {
    let root = root.as_ref();
    let mut stats = PruneStats::default();

    if !root.is_dir() {
        debug!("Nothing to prune at '{}'", root.display());
        return stats;
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry while pruning: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }
        stats.directories_visited += 1;

        let path = entry.path();
        match is_empty_dir(path) {
            Ok(true) => match fs::remove_dir(path) {
                Ok(()) => {
                    debug!("Removed empty directory '{}'", path.display());
                    stats.directories_removed += 1;
                }
                Err(e) => warn!("Failed to remove empty directory '{}': {}", path.display(), e),
            },
            Ok(false) => {}
            Err(e) => debug!("Failed to read directory '{}': {}", path.display(), e),
        }
    }

    stats
}

fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_removes_empty_leaf_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("dest");
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join("full")).unwrap();
        fs::write(root.join("full").join("keep.txt"), b"keep").unwrap();

        let stats = prune_empty_dirs(&root);

        assert!(!root.join("empty").exists());
        assert!(root.join("full").join("keep.txt").exists());
        assert_eq!(stats.directories_removed, 1);
        assert_eq!(stats.directories_visited, 3);
    }

    #[test]
    fn test_empty_root_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("dest");
        fs::create_dir(&root).unwrap();

        let stats = prune_empty_dirs(&root);

        assert!(!root.exists());
        assert_eq!(stats.directories_removed, 1);
    }

    #[test]
    fn test_single_pass_keeps_newly_emptied_parent() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("dest");
        fs::create_dir_all(root.join("parent").join("child")).unwrap();
        fs::write(root.join("file.txt"), b"x").unwrap();

        let stats = prune_empty_dirs(&root);

        // The child is removed, but the parent was visited while it still held the child
        assert!(!root.join("parent").join("child").exists());
        assert!(root.join("parent").exists());
        assert_eq!(stats.directories_removed, 1);

        // A second pass picks up the parent
        let stats = prune_empty_dirs(&root);
        assert!(!root.join("parent").exists());
        assert_eq!(stats.directories_removed, 1);
        assert!(root.join("file.txt").exists());
    }

    #[test]
    fn test_missing_root_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let stats = prune_empty_dirs(temp_dir.path().join("missing"));
        assert_eq!(stats, PruneStats::default());
    }
}
