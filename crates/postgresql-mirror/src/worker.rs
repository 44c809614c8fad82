//! In-process mirror job queue.
//!
//! [`QueueSink`] serializes events onto a bounded channel; [`MirrorWorker`]
//! drains it, running up to `concurrency` jobs at a time through a shared
//! [`JobRunner`].

use crate::job::{JobOutcome, JobRunner};
use async_trait::async_trait;
use mirror_core::{EventSink, MirrorEvent, SinkError};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// [`EventSink`] that enqueues JSON job payloads on a channel.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::Sender<String>,
}

#[async_trait]
impl EventSink for QueueSink {
    async fn enqueue(&self, event: MirrorEvent) -> Result<(), SinkError> {
        let payload = event.to_json()?;
        self.tx.send(payload).await.map_err(|_| SinkError::Closed)
    }
}

/// Create a bounded job queue.
pub fn queue(capacity: usize) -> (QueueSink, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueSink { tx }, rx)
}

/// Counts of finished jobs by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub discarded: u64,
    pub swallowed: u64,
    pub exhausted: u64,
    pub panicked: u64,
}

impl WorkerStats {
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Completed(_) => self.completed += 1,
            JobOutcome::Discarded(_) => self.discarded += 1,
            JobOutcome::Swallowed(_) => self.swallowed += 1,
            JobOutcome::Exhausted { .. } => self.exhausted += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.completed + self.discarded + self.swallowed + self.exhausted + self.panicked
    }

    /// Jobs that did not complete.
    pub fn failed(&self) -> u64 {
        self.total() - self.completed
    }

    fn record_join(&mut self, result: Result<JobOutcome, JoinError>) {
        match result {
            Ok(outcome) => self.record(&outcome),
            Err(e) => {
                error!("[MirrorWorker] Job task failed: {e}");
                self.panicked += 1;
            }
        }
    }
}

pub struct MirrorWorker {
    runner: Arc<JobRunner>,
    concurrency: usize,
}

impl MirrorWorker {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self {
            runner,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run jobs until every sender is dropped and in-flight jobs finish.
    pub async fn run(&self, mut jobs: mpsc::Receiver<String>) -> WorkerStats {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut stats = WorkerStats::default();

        info!(
            "[MirrorWorker] Started with concurrency {}",
            self.concurrency
        );

        while let Some(payload) = jobs.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let runner = self.runner.clone();
            tasks.spawn(async move {
                let outcome = runner.perform(&payload).await;
                drop(permit);
                outcome
            });

            while let Some(result) = tasks.try_join_next() {
                stats.record_join(result);
            }
        }

        debug!("[MirrorWorker] Queue closed, waiting for {} jobs", tasks.len());
        while let Some(result) = tasks.join_next().await {
            stats.record_join(result);
        }

        info!(
            "[MirrorWorker] Finished: {} completed, {} failed",
            stats.completed,
            stats.failed()
        );
        stats
    }
}
