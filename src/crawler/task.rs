//! Resumable crawl of a single target
//!
//! A `CrawlTask` ties one fetcher and one sink to the shared checkpoint store
//! and rate limiter. It drives the walker a page at a time and, after every
//! page, flushes the sink and then saves the checkpoint, so every item it has
//! observed belongs to a cursor position that is durable before the next
//! request goes out. Crashing between the two writes re-fetches that page on
//! resume: delivery is at-least-once, never at-most-once.

use crate::crawler::page::{FetchError, ItemSink, PageFetcher};
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::walker::{PageWalker, Step, WalkOutcome, WalkSettings};
use crate::state::{CrawlTarget, Cursor, TaskState};
use crate::storage::{CheckpointRecord, CheckpointStore};
use crate::MastodonteError;
use std::sync::Arc;

/// Per-task settings
#[derive(Debug, Clone, Copy)]
pub struct TaskSettings {
    pub walk: WalkSettings,

    /// Continue from a stored checkpoint; when false the target is re-crawled
    /// from the start and its old record is overwritten
    pub resume: bool,
}

/// How a task invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The sequence was walked to the end in this invocation
    Completed { items_seen: u64 },

    /// The checkpoint was already complete; nothing was requested
    AlreadyCompleted,

    /// The page budget ran out; the checkpoint is resumable
    Suspended {
        items_seen: u64,
        cursor: Option<Cursor>,
    },

    /// The target does not exist remotely; no checkpoint was written
    NotFound,

    /// This invocation failed; a later resume continues from the last save
    Failed { reason: String },
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Moves `state` to `next`, refusing transitions the state machine forbids
fn advance(state: &mut TaskState, next: TaskState, target: &CrawlTarget) -> crate::Result<()> {
    if !state.can_transition_to(next) {
        return Err(MastodonteError::InvalidTransition {
            from: *state,
            to: next,
        });
    }

    tracing::trace!(key = %target, from = %state, to = %next, "task transition");
    *state = next;
    Ok(())
}

/// One resumable crawl of one target
pub struct CrawlTask<F: PageFetcher, S: ItemSink> {
    target: CrawlTarget,
    store: Arc<dyn CheckpointStore>,
    limiter: Arc<RateLimiter>,
    fetcher: F,
    sink: S,
    settings: TaskSettings,
    state: TaskState,
}

impl<F: PageFetcher, S: ItemSink> CrawlTask<F, S> {
    pub fn new(
        target: CrawlTarget,
        store: Arc<dyn CheckpointStore>,
        limiter: Arc<RateLimiter>,
        fetcher: F,
        sink: S,
        settings: TaskSettings,
    ) -> Self {
        Self {
            target,
            store,
            limiter,
            fetcher,
            sink,
            settings,
            state: TaskState::Init,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Runs the task to a terminal state
    ///
    /// Errors never escape: they are logged against the target and turned
    /// into `TaskOutcome::Failed`.
    pub async fn run(mut self) -> TaskOutcome {
        match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    key = %self.target,
                    state = %self.state,
                    error = %e,
                    "crawl failed"
                );
                if !self.state.is_terminal() {
                    self.state = TaskState::Failed;
                }
                TaskOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn execute(&mut self) -> crate::Result<TaskOutcome> {
        let Self {
            target,
            store,
            limiter,
            fetcher,
            sink,
            settings,
            state,
        } = self;

        // Init: a corrupt checkpoint is an error here, never "absent"
        let previous = if settings.resume {
            store.load(target)?
        } else {
            None
        };

        let record = match previous {
            Some(record) if record.completed => {
                advance(state, TaskState::Completed, target)?;
                tracing::info!(
                    key = %target,
                    items_seen = record.items_seen,
                    "already completed, skipping"
                );
                return Ok(TaskOutcome::AlreadyCompleted);
            }
            Some(record) => {
                advance(state, TaskState::Resuming, target)?;
                tracing::info!(
                    key = %target,
                    cursor = ?record.cursor,
                    items_seen = record.items_seen,
                    "resuming from checkpoint"
                );
                Some(record)
            }
            None => None,
        };
        let had_record = record.is_some();

        match fetcher.resolve().await {
            Ok(()) => {}
            Err(FetchError::NotFound { what }) => {
                advance(state, TaskState::Failed, target)?;
                tracing::warn!(key = %target, %what, "target not found, skipping");
                return Ok(TaskOutcome::NotFound);
            }
            Err(e) => return Err(e.into()),
        }

        advance(state, TaskState::Crawling, target)?;
        let mut record = record.unwrap_or_default();
        let mut walker = PageWalker::new(
            &*fetcher,
            &**limiter,
            target.host(),
            record.cursor.clone(),
            settings.walk,
        );

        loop {
            match walker.step(sink).await {
                Ok(Step::Page { items, last }) => {
                    advance(state, TaskState::Checkpointing, target)?;
                    sink.flush()?;
                    record.advance(walker.cursor().cloned(), items);

                    if last {
                        return complete(state, &**store, target, &mut record);
                    }

                    store.save(target, &record)?;
                    tracing::info!(
                        key = %target,
                        items,
                        items_seen = record.items_seen,
                        cursor = ?record.cursor,
                        "page checkpointed"
                    );
                    advance(state, TaskState::Crawling, target)?;
                }
                Ok(Step::Finished(WalkOutcome::Exhausted)) => {
                    advance(state, TaskState::Checkpointing, target)?;
                    sink.flush()?;
                    return complete(state, &**store, target, &mut record);
                }
                Ok(Step::Finished(WalkOutcome::BudgetExceeded)) => {
                    advance(state, TaskState::Suspended, target)?;
                    tracing::info!(
                        key = %target,
                        pages = walker.pages_fetched(),
                        items_seen = record.items_seen,
                        "page budget exhausted, suspending"
                    );
                    return Ok(TaskOutcome::Suspended {
                        items_seen: record.items_seen,
                        cursor: record.cursor,
                    });
                }
                Err(e) => {
                    if had_record || walker.pages_fetched() > 0 {
                        let persisted = sink.flush().and_then(|()| store.save(target, &record));
                        if let Err(save_err) = persisted {
                            tracing::warn!(
                                key = %target,
                                error = %save_err,
                                "could not persist progress after fetch failure"
                            );
                        }
                    }

                    advance(state, TaskState::Failed, target)?;
                    tracing::error!(
                        key = %target,
                        error = %e,
                        retryable = e.is_retryable(),
                        cursor = ?record.cursor,
                        "fetch failed, will resume from last checkpoint"
                    );
                    return Ok(TaskOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

fn complete(
    state: &mut TaskState,
    store: &dyn CheckpointStore,
    target: &CrawlTarget,
    record: &mut CheckpointRecord,
) -> crate::Result<TaskOutcome> {
    store.mark_completed(target, record)?;
    record.completed = true;
    advance(state, TaskState::Completed, target)?;

    tracing::info!(key = %target, items_seen = record.items_seen, "crawl completed");
    Ok(TaskOutcome::Completed {
        items_seen: record.items_seen,
    })
}
