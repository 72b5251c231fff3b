//! Fixed-size worker pool over partitioned crawl targets
//!
//! This module handles:
//! - Splitting the target list into one round-robin partition per worker
//! - Running each partition sequentially on its own tokio task
//! - Joining every worker before reporting the total wall-clock time
//!
//! A failed target is logged and the worker moves on to the next one;
//! failures never abort sibling workers or the run.

use crate::crawler::partition::partition;
use crate::crawler::task::TaskOutcome;
use crate::state::CrawlTarget;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Summary of one scheduling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Wall-clock time from start until the last worker finished
    pub elapsed: Duration,

    /// Number of targets scheduled
    pub targets: usize,

    /// Number of workers the targets were partitioned across
    pub workers: usize,
}

/// Scheduler owning a fixed number of workers
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    workers: NonZeroUsize,
}

impl Scheduler {
    /// Creates a scheduler; a worker count of zero is raised to one
    pub fn new(workers: usize) -> Self {
        Self {
            workers: NonZeroUsize::new(workers).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Runs `task_factory` for every target and waits for all workers
    ///
    /// Each worker executes the targets of its partition one after another,
    /// awaiting each task before starting the next.
    pub async fn run<F, Fut>(&self, targets: Vec<CrawlTarget>, task_factory: F) -> RunReport
    where
        F: Fn(CrawlTarget) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        let start = Instant::now();
        let total = targets.len();
        let factory = Arc::new(task_factory);
        let mut workers = JoinSet::new();

        tracing::info!(targets = total, workers = self.workers(), "starting scheduled run");

        for (worker, assigned) in partition(targets, self.workers).into_iter().enumerate() {
            if assigned.is_empty() {
                continue;
            }

            let factory = Arc::clone(&factory);
            workers.spawn(async move {
                tracing::debug!(worker, targets = assigned.len(), "worker started");

                for target in assigned {
                    let key = target.key();
                    match factory(target).await {
                        TaskOutcome::Failed { reason } => {
                            tracing::warn!(worker, %key, %reason, "target failed, continuing");
                        }
                        outcome => {
                            tracing::debug!(worker, %key, ?outcome, "target finished");
                        }
                    }
                }

                tracing::debug!(worker, "worker finished");
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker terminated abnormally");
            }
        }

        let elapsed = start.elapsed();
        tracing::info!(
            targets = total,
            elapsed_secs = elapsed.as_secs_f64(),
            "scheduled run finished"
        );

        RunReport {
            elapsed,
            targets: total,
            workers: self.workers(),
        }
    }
}
