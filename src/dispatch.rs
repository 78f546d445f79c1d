//! Bounded fan-out over pending items.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::item::WorkItem;
use crate::ledger::Partition;
use crate::progress::{Progress, RunSummary};
use crate::record::ResultRecord;
use crate::store::sink::ResultSink;
use crate::worker::Worker;

/// A record the sink refused. Ends the run.
struct Unsaved {
    record: ResultRecord,
    error: anyhow::Error,
}

/// Runs at most `concurrency` workers at once and persists each result as
/// soon as its worker finishes.
pub struct Dispatcher {
    worker: Arc<Worker>,
    sink: Arc<ResultSink>,
    concurrency: usize,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(worker: Arc<Worker>, sink: Arc<ResultSink>, concurrency: usize) -> Self {
        Self {
            worker,
            sink,
            concurrency: concurrency.max(1),
            show_progress: false,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process every pending item. Results arrive in completion order.
    ///
    /// Item failures are recorded and the run goes on. A failure to persist
    /// a record aborts all remaining work and is returned.
    pub async fn run(&self, partition: Partition) -> Result<RunSummary> {
        let Partition {
            pending,
            total,
            already_done,
        } = partition;
        let mut progress = Progress::new(total, already_done, pending.len(), self.show_progress);

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for item in pending {
            tasks.spawn(run_one(
                item,
                Arc::clone(&self.worker),
                Arc::clone(&self.sink),
                Arc::clone(&permits),
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(record)) => progress.observe(&record),
                Ok(Err(Unsaved { record, error })) => {
                    let json = serde_json::to_string(&record).unwrap_or_default();
                    error!(
                        path = %self.sink.path().display(),
                        record = %json,
                        "failed to persist result, aborting run: {error:#}"
                    );
                    tasks.abort_all();
                    let summary = progress.summary();
                    warn!(
                        saved = summary.newly_completed,
                        "run aborted; saved results are kept"
                    );
                    return Err(error.context(format!(
                        "result for {:?} was not saved",
                        record.question()
                    )));
                }
                // Workers catch their own panics, so this is a runtime fault.
                Err(e) => return Err(anyhow!("worker task failed: {e}")),
            }
        }

        Ok(progress.finish())
    }
}

async fn run_one(
    item: WorkItem,
    worker: Arc<Worker>,
    sink: Arc<ResultSink>,
    permits: Arc<Semaphore>,
) -> Result<ResultRecord, Unsaved> {
    // The semaphore is never closed.
    let _permit = permits.acquire_owned().await.ok();
    let record = worker.run(&item).await;

    let sink_for_write = Arc::clone(&sink);
    let to_write = record.clone();
    let written = tokio::task::spawn_blocking(move || sink_for_write.append(&to_write))
        .await
        .map_err(|e| anyhow!("persistence task failed: {e}"))
        .and_then(|r| r);

    match written {
        Ok(()) => {
            debug!(question = %record.question(), "result saved");
            Ok(record)
        }
        Err(error) => Err(Unsaved { record, error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::inspect::LocalInspector;
    use crate::processor::Processor;
    use crate::store::read_records;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the highest number of calls in flight at once.
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Processor for Gauge {
        async fn process(&self, _prompt: &str, _session: &SessionConfig) -> Result<Map<String, Value>> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Map::new())
        }
    }

    fn partition(n: usize) -> Partition {
        Partition {
            pending: (0..n).map(|i| WorkItem::new(format!("Q{i}"), "A")).collect(),
            total: n,
            already_done: 0,
        }
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let worker = Arc::new(Worker::new(
            gauge.clone(),
            Arc::new(LocalInspector::default()),
            SessionConfig::default(),
        ));
        let sink = Arc::new(ResultSink::open(dir.path().join("out.jsonl")).unwrap());

        let summary = Dispatcher::new(worker, sink, 3)
            .run(partition(12))
            .await
            .unwrap();

        assert_eq!(summary.newly_completed, 12);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 3);
        assert!(gauge.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn persistence_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.jsonl");
        let worker = Arc::new(Worker::new(
            Arc::new(Gauge {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
            Arc::new(LocalInspector::default()),
            SessionConfig::default(),
        ));
        let sink = Arc::new(ResultSink::open(&out).unwrap());
        // A directory where the output file should be makes every append fail.
        std::fs::create_dir(&out).unwrap();

        let err = Dispatcher::new(worker, sink, 2)
            .run(partition(4))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("was not saved"));
        assert!(read_records(&out).is_err());
    }
}
