//! Property tests for reconciliation

use super::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use proptest::prelude::*;

/// Strategy for relative file paths up to three levels deep
fn relative_file() -> impl Strategy<Value = String> {
    (prop::collection::vec("[a-c]{1,2}", 0..3), "[a-e]{1,3}\\.txt").prop_map(|(dirs, name)| {
        let mut parts = dirs;
        parts.push(name);
        parts.join("/")
    })
}

/// Strategy for a tree: relative path to size
fn tree() -> impl Strategy<Value = BTreeMap<String, u64>> {
    prop::collection::btree_map(relative_file(), 0u64..4, 0..24)
}

fn snapshot(root: &Path, files: &BTreeMap<String, u64>) -> DirectorySnapshot {
    DirectorySnapshot::from_records(
        root,
        files
            .iter()
            .map(|(name, size)| (root.join(name), FileRecord::new(name, *size))),
    )
}

proptest! {
    #[test]
    fn test_reconcile_partitions_by_correspondence(
        source_files in tree(),
        dest_files in tree(),
    ) {
        let source_root = PathBuf::from("/mirror/source");
        let dest_root = PathBuf::from("/mirror/destination");

        let plan = reconcile(
            snapshot(&source_root, &source_files),
            snapshot(&dest_root, &dest_files),
            &source_root,
            &dest_root,
        );

        // Copies are exactly the source-only and size-mismatched files
        for (name, size) in &source_files {
            let source_path = source_root.join(name);
            let needs_copy = dest_files.get(name) != Some(size);
            prop_assert_eq!(plan.copies.contains(&source_path), needs_copy);
            if needs_copy {
                let expected = dest_root.join(name);
                prop_assert_eq!(plan.copies.companion(&source_path), Some(expected.as_path()));
            }
        }
        prop_assert!(plan.copies.paths().all(|p| p.starts_with(&source_root)));

        // Deletes are exactly the destination-only files
        for name in dest_files.keys() {
            let dest_path = dest_root.join(name);
            prop_assert_eq!(plan.deletes.contains(&dest_path), !source_files.contains_key(name));
        }
        prop_assert_eq!(
            plan.deletes.len(),
            dest_files.keys().filter(|name| !source_files.contains_key(*name)).count()
        );

        // Nothing is both copied over and deleted
        for path in plan.deletes.paths() {
            let relative = path.strip_prefix(&dest_root).unwrap();
            prop_assert!(!plan.copies.contains(&source_root.join(relative)));
        }
    }

    #[test]
    fn test_reconcile_against_copy_of_itself_is_empty(files in tree()) {
        let source_root = PathBuf::from("/a");
        let dest_root = PathBuf::from("/b");

        let plan = reconcile(
            snapshot(&source_root, &files),
            snapshot(&dest_root, &files),
            &source_root,
            &dest_root,
        );

        prop_assert!(plan.is_empty());
        prop_assert_eq!(plan.bytes_to_copy, 0);
    }
}
