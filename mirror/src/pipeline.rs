//! Dispatch queue and fixed-size worker pool
//!
//! A pipeline turns a [`WorkSet`] into a stream of [`SyncTask`]s on a bounded
//! multi-consumer channel, lets a fixed number of workers drain it, and fans
//! the per-task outcomes back in. The outcome stream ends once every worker
//! has seen the end of the task stream.

use std::path::PathBuf;
use std::sync::Arc;
use async_channel as chan;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::Result;
use crate::operations::{OperationKind, SyncTask, TaskOperation};
use crate::reconcile::WorkSet;

/// Tasks buffered between the dispatcher and the workers
const DISPATCH_CAPACITY: usize = 16;

/// Lazily produced, single-pass sequence of tasks
pub struct TaskQueue {
    receiver: chan::Receiver<SyncTask>,
    len: usize,
}

impl TaskQueue {
    /// Number of tasks the dispatcher will produce in total
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Next task, or `None` once the dispatcher is done and the queue drained
    pub async fn next(&self) -> Option<SyncTask> {
        self.receiver.recv().await.ok()
    }
}

/// Feed every entry of `work_set` into a new task queue.
///
/// Must be called from within a tokio runtime. The producer stops early if
/// every consumer goes away.
pub fn dispatch(work_set: WorkSet) -> TaskQueue {
    let len = work_set.len();
    let (sender, receiver) = chan::bounded(DISPATCH_CAPACITY);

    tokio::spawn(async move {
        for (source, destination) in work_set {
            if sender.send(SyncTask { source, destination }).await.is_err() {
                debug!("All workers gone, dispatcher stopping early");
                break;
            }
        }
        // Dropping the sender closes the queue
    });

    TaskQueue { receiver, len }
}

/// Result of applying an operation to one task
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: SyncTask,
    pub result: Result<()>,
}

/// Outcomes of a running worker pool, in completion order
pub struct OutcomeStream {
    receiver: mpsc::Receiver<TaskOutcome>,
    workers: usize,
}

impl OutcomeStream {
    /// Next outcome; `None` once all workers have finished
    pub async fn next(&mut self) -> Option<TaskOutcome> {
        self.receiver.recv().await
    }

    /// Number of workers the pool started
    pub fn workers(&self) -> usize {
        self.workers
    }
}

/// Start `worker_count` workers draining `queue` with `operation`.
///
/// Never starts more workers than there are tasks.
pub fn run_workers(
    queue: TaskQueue,
    operation: Arc<dyn TaskOperation>,
    worker_count: usize,
) -> OutcomeStream {
    let workers = if queue.is_empty() {
        0
    } else {
        worker_count.clamp(1, queue.len())
    };

    let (sender, receiver) = mpsc::channel(workers.max(1));
    let queue = Arc::new(queue);

    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let operation = Arc::clone(&operation);
        let outcomes = sender.clone();

        tokio::spawn(async move {
            while let Some(task) = queue.next().await {
                let result = operation.apply(&task).await;
                if outcomes.send(TaskOutcome { task, result }).await.is_err() {
                    break;
                }
            }
            debug!("{} worker {} finished", operation.kind(), worker_id);
        });
    }

    // Only the workers' clones remain, so the stream closes when the last one exits
    drop(sender);

    OutcomeStream { receiver, workers }
}

/// A task that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: OperationKind,
    pub path: PathBuf,
    pub error: String,
}

/// Tally of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub kind: OperationKind,
    /// Tasks in the work set
    pub planned: usize,
    /// Tasks that completed without error
    pub succeeded: usize,
    pub failures: Vec<TaskFailure>,
    /// Workers the pool started
    pub workers: usize,
}

impl PipelineReport {
    pub fn empty(kind: OperationKind) -> Self {
        Self {
            kind,
            planned: 0,
            succeeded: 0,
            failures: Vec::new(),
            workers: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded == self.planned
    }
}

/// Dispatch `work_set`, apply `operation` with a pool of `worker_count`
/// workers and collect the outcomes.
pub async fn run_pipeline<O>(work_set: WorkSet, operation: O, worker_count: usize) -> PipelineReport
where
    O: TaskOperation + 'static,
{
    let kind = operation.kind();
    let planned = work_set.len();

    let queue = dispatch(work_set);
    let mut outcomes = run_workers(queue, Arc::new(operation), worker_count);

    let mut report = PipelineReport {
        kind,
        planned,
        succeeded: 0,
        failures: Vec::new(),
        workers: outcomes.workers(),
    };

    while let Some(outcome) = outcomes.next().await {
        match outcome.result {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                error!("{} failed for '{}': {}", kind, outcome.task.source.display(), e);
                report.failures.push(TaskFailure {
                    kind,
                    path: outcome.task.source,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;
    use crate::error::SyncError;

    /// Records every task it sees and fails paths ending in `.bad`
    #[derive(Default)]
    struct RecordingOperation {
        seen: std::sync::Mutex<Vec<PathBuf>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TaskOperation for Arc<RecordingOperation> {
        fn kind(&self) -> OperationKind {
            OperationKind::Copy
        }

        async fn apply(&self, task: &SyncTask) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.seen.lock().unwrap().push(task.source.clone());
            if task.source.extension().is_some_and(|ext| ext == "bad") {
                return Err(SyncError::copy_error(&task.source, "", "refused"));
            }
            Ok(())
        }
    }

    fn work_set(count: usize) -> WorkSet {
        let mut set = WorkSet::new();
        for i in 0..count {
            set.insert_copy(PathBuf::from(format!("/src/{i}.txt")), PathBuf::from(format!("/dst/{i}.txt")));
        }
        set
    }

    #[tokio::test]
    async fn test_dispatch_yields_every_entry_once() {
        let queue = dispatch(work_set(50));
        assert_eq!(queue.len(), 50);

        let mut sources = HashSet::new();
        while let Some(task) = queue.next().await {
            assert!(task.destination.is_some());
            assert!(sources.insert(task.source));
        }
        assert_eq!(sources.len(), 50);
    }

    #[tokio::test]
    async fn test_dispatch_empty_set_ends_immediately() {
        let queue = dispatch(WorkSet::new());
        assert!(queue.is_empty());
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn test_single_worker_completes_all_tasks() {
        let operation = Arc::new(RecordingOperation::default());
        let report = run_pipeline(work_set(25), Arc::clone(&operation), 1).await;

        assert_eq!(report.workers, 1);
        assert_eq!(report.planned, 25);
        assert_eq!(report.succeeded, 25);
        assert!(report.is_complete());
        assert_eq!(operation.seen.lock().unwrap().len(), 25);
        assert_eq!(operation.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_workers_capped_by_task_count() {
        let operation = Arc::new(RecordingOperation::default());
        let report = run_pipeline(work_set(3), Arc::clone(&operation), 10).await;

        assert_eq!(report.workers, 3);
        assert_eq!(report.succeeded, 3);
        assert!(operation.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_no_workers_for_empty_work() {
        let operation = Arc::new(RecordingOperation::default());
        let report = run_pipeline(WorkSet::new(), Arc::clone(&operation), 4).await;

        assert_eq!(report, PipelineReport::empty(OperationKind::Copy));
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut set = work_set(10);
        set.insert_copy(PathBuf::from("/src/broken.bad"), PathBuf::from("/dst/broken.bad"));
        set.insert_copy(PathBuf::from("/src/other.bad"), PathBuf::from("/dst/other.bad"));

        let operation = Arc::new(RecordingOperation::default());
        let report = run_pipeline(set, Arc::clone(&operation), 4).await;

        // Every task ran despite the failures
        assert_eq!(operation.seen.lock().unwrap().len(), 12);
        assert_eq!(report.planned, 12);
        assert_eq!(report.succeeded, 10);
        assert!(!report.is_complete());

        let failed: HashSet<_> = report.failures.iter().map(|f| f.path.clone()).collect();
        assert!(failed.contains(&PathBuf::from("/src/broken.bad")));
        assert!(failed.contains(&PathBuf::from("/src/other.bad")));
    }

    #[tokio::test]
    async fn test_outcome_stream_closes_after_all_workers() {
        let queue = dispatch(work_set(8));
        let operation: Arc<dyn TaskOperation> = Arc::new(Arc::new(RecordingOperation::default()));
        let mut outcomes = run_workers(queue, operation, 3);

        let mut count = 0;
        while let Some(outcome) = outcomes.next().await {
            assert!(outcome.result.is_ok());
            count += 1;
        }
        assert_eq!(count, 8);
        assert_eq!(outcomes.workers(), 3);
    }
}
