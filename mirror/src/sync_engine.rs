//! Sync engine that orchestrates a mirror run

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{error, info, warn};

use crate::error::{Result, SyncError};
use crate::operations::{CopyOperation, DeleteOperation, OperationKind};
use crate::options::SyncOptions;
use crate::pipeline::{run_pipeline, PipelineReport, TaskFailure};
use crate::prune::{prune_empty_dirs, PruneStats};
use crate::reconcile::{reconcile, SyncPlan};
use crate::scanner::{scan_directory, DirectorySnapshot};

/// Outcome of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub copy: PipelineReport,
    pub delete: PipelineReport,
    /// Bytes the copy set was expected to transfer
    pub bytes_planned: u64,
    /// Set when a scan failed and no work was attempted
    pub scan_failure: Option<String>,
    pub prune: PruneStats,
    pub duration: Duration,
}

impl SyncReport {
    fn new(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
            copy: PipelineReport::empty(OperationKind::Copy),
            delete: PipelineReport::empty(OperationKind::Delete),
            bytes_planned: 0,
            scan_failure: None,
            prune: PruneStats::default(),
            duration: Duration::default(),
        }
    }

    /// True when both scans succeeded and every planned task completed
    pub fn is_successful(&self) -> bool {
        self.scan_failure.is_none()
            && self.copy.succeeded + self.delete.succeeded == self.copy.planned + self.delete.planned
    }

    /// Every task that failed, copies first
    pub fn failures(&self) -> impl Iterator<Item = &TaskFailure> {
        self.copy.failures.iter().chain(self.delete.failures.iter())
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        if let Some(reason) = &self.scan_failure {
            return format!("Sync aborted before any changes: {}", reason);
        }

        format!(
            "Sync completed in {:.2}s: {}/{} copied, {}/{} deleted, {} empty directories removed, {} failures",
            self.duration.as_secs_f64(),
            self.copy.succeeded,
            self.copy.planned,
            self.delete.succeeded,
            self.delete.planned,
            self.prune.directories_removed,
            self.copy.failures.len() + self.delete.failures.len(),
        )
    }
}

/// Main sync engine
#[derive(Debug, Clone)]
pub struct SyncEngine {
    options: SyncOptions,
}

impl SyncEngine {
    /// Create a new sync engine, rejecting invalid options
    pub fn new(options: SyncOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Get sync engine options
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Mirror `source` into `destination`.
    ///
    /// Copy and delete pipelines run concurrently; empty directories are
    /// pruned once both have drained. A failed scan aborts the run before any
    /// file is touched, so a transient source error can never empty the
    /// destination.
    pub async fn sync<P1: AsRef<Path>, P2: AsRef<Path>>(&self, source: P1, destination: P2) -> SyncReport {
        let started = Instant::now();
        let source_root = normalize_root(source.as_ref());
        let dest_root = normalize_root(destination.as_ref());
        let mut report = SyncReport::new(source_root.clone(), dest_root.clone());

        info!("Starting sync from '{}' to '{}'", source_root.display(), dest_root.display());

        if let Err(e) = fs::create_dir_all(&dest_root).await {
            error!("Failed to create destination directory '{}': {}", dest_root.display(), e);
        }

        let plan = match self.scan_and_reconcile(&source_root, &dest_root).await {
            Ok(plan) => plan,
            Err(e) => {
                error!("Scan failed, nothing was changed: {}", e);
                report.scan_failure = Some(e.to_string());
                report.duration = started.elapsed();
                return report;
            }
        };

        info!(
            "Sync plan: {} copies ({} bytes), {} deletes",
            plan.copies.len(),
            plan.bytes_to_copy,
            plan.deletes.len()
        );
        report.bytes_planned = plan.bytes_to_copy;

        let workers = self.options.workers;
        let (copy, delete) = tokio::join!(
            run_pipeline(plan.copies, CopyOperation::new(self.options.buffer_size), workers),
            run_pipeline(plan.deletes, DeleteOperation, workers),
        );
        report.copy = copy;
        report.delete = delete;

        report.prune = prune_blocking(dest_root).await;
        report.duration = started.elapsed();

        if report.is_successful() {
            info!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
        }

        report
    }

    /// Compute the work a sync would do without changing anything.
    ///
    /// A missing destination is treated as empty.
    pub async fn preview<P1: AsRef<Path>, P2: AsRef<Path>>(&self, source: P1, destination: P2) -> Result<SyncPlan> {
        let source_root = normalize_root(source.as_ref());
        let dest_root = normalize_root(destination.as_ref());

        let (source_scan, dest_scan) = tokio::join!(
            scan_blocking(source_root.clone()),
            scan_blocking(dest_root.clone()),
        );

        let dest_snapshot = match dest_scan {
            Err(e) if e.is_not_found() => DirectorySnapshot::new(&dest_root),
            other => other?,
        };

        Ok(reconcile(source_scan?, dest_snapshot, &source_root, &dest_root))
    }

    async fn scan_and_reconcile(&self, source_root: &Path, dest_root: &Path) -> Result<SyncPlan> {
        let (source_scan, dest_scan) = tokio::join!(
            scan_blocking(source_root.to_path_buf()),
            scan_blocking(dest_root.to_path_buf()),
        );

        let source_snapshot = source_scan?;
        let dest_snapshot = dest_scan?;
        info!(
            "Scanned {} source files and {} destination files",
            source_snapshot.len(),
            dest_snapshot.len()
        );

        Ok(reconcile(source_snapshot, dest_snapshot, source_root, dest_root))
    }
}

/// Mirror `source` into `destination` with `workers` workers per pipeline.
///
/// Returns true when every dispatched task succeeded. Details of any failure
/// are logged.
pub async fn sync_folder(source: impl AsRef<Path>, destination: impl AsRef<Path>, workers: usize) -> bool {
    match SyncEngine::new(SyncOptions::with_workers(workers)) {
        Ok(engine) => engine.sync(source, destination).await.is_successful(),
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

async fn scan_blocking(root: PathBuf) -> Result<DirectorySnapshot> {
    tokio::task::spawn_blocking(move || scan_directory(&root))
        .await
        .map_err(|e| SyncError::TaskJoin(e.to_string()))?
}

async fn prune_blocking(root: PathBuf) -> PruneStats {
    match tokio::task::spawn_blocking(move || prune_empty_dirs(&root)).await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Pruning empty directories failed: {}", e);
            PruneStats::default()
        }
    }
}

/// Make `path` absolute and lexically clean: drop `.` components, resolve
/// `..` against the preceding component and remove trailing separators.
/// Symlinks are not resolved.
pub fn normalize_root(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(component.as_os_str()),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }

    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}
