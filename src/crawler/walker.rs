//! Cursor-following pagination walker
//!
//! The walker is pure sequencing: fetch the page at the current cursor, hand
//! its items to the sink in server order, forward rate-limit hints, advance
//! the cursor. It never persists anything and never retries; the crawl task
//! drives it one page at a time and decides what a failure means.

use crate::crawler::page::{FetchError, ItemSink, PageFetcher};
use crate::crawler::rate_limit::RateLimiter;
use crate::state::Cursor;
use std::collections::HashSet;
use std::time::Duration;

/// Per-walk limits and pacing
#[derive(Debug, Clone, Copy)]
pub struct WalkSettings {
    /// Maximum pages fetched in one invocation
    pub max_pages: u32,

    /// Remaining-quota threshold at which the rate-limit gate starts waiting
    pub tolerance: u32,

    /// Unconditional pause before every request
    pub politeness_delay: Duration,
}

impl WalkSettings {
    /// Settings with no page budget, for nested walks that must run to the end
    pub fn unbounded(tolerance: u32, politeness_delay: Duration) -> Self {
        Self {
            max_pages: u32::MAX,
            tolerance,
            politeness_delay,
        }
    }
}

/// Why a walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// No further pages exist
    Exhausted,

    /// The page budget ran out while more pages remained
    BudgetExceeded,
}

/// Result of a single walker step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A non-empty page was sunk; `last` is set when it carried no next cursor
    Page { items: usize, last: bool },

    /// The walk ended without sinking anything in this step
    Finished(WalkOutcome),
}

/// Drives one target's pagination sequence
pub struct PageWalker<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    limiter: &'a RateLimiter,
    host: String,
    cursor: Option<Cursor>,
    requested: HashSet<Cursor>,
    pages_fetched: u32,
    settings: WalkSettings,
}

impl<'a, F: PageFetcher + ?Sized> PageWalker<'a, F> {
    /// Creates a walker positioned at `cursor` (`None` is the start of the sequence)
    pub fn new(
        fetcher: &'a F,
        limiter: &'a RateLimiter,
        host: &str,
        cursor: Option<Cursor>,
        settings: WalkSettings,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            host: host.to_string(),
            cursor,
            requested: HashSet::new(),
            pages_fetched: 0,
            settings,
        }
    }

    /// The cursor the next request will use
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Fetches and sinks at most one page
    ///
    /// On error the cursor is left where it was, so the failed page is the
    /// first one requested on resume.
    pub async fn step<S: ItemSink + ?Sized>(&mut self, sink: &mut S) -> Result<Step, FetchError> {
        if self.pages_fetched >= self.settings.max_pages {
            return Ok(Step::Finished(WalkOutcome::BudgetExceeded));
        }

        if !self.settings.politeness_delay.is_zero() {
            tokio::time::sleep(self.settings.politeness_delay).await;
        }
        self.limiter.gate(&self.host, self.settings.tolerance).await;

        tracing::debug!(host = %self.host, cursor = ?self.cursor, "fetching page");
        let page = self.fetcher.fetch_page(self.cursor.as_ref()).await?;
        if let Some(cursor) = &self.cursor {
            self.requested.insert(cursor.clone());
        }

        if page.items.is_empty() {
            return Ok(Step::Finished(WalkOutcome::Exhausted));
        }

        let count = page.items.len();
        for item in page.items {
            sink.accept(item);
        }

        self.limiter.observe(&self.host, &page.hints).await;
        self.pages_fetched += 1;

        // A cursor already requested in this walk would fetch a page twice
        let mut next = page.next_cursor;
        if next.as_ref().is_some_and(|c| self.requested.contains(c)) {
            tracing::warn!(
                host = %self.host,
                cursor = ?next,
                "server returned an already requested cursor, treating sequence as exhausted"
            );
            next = None;
        }

        let last = next.is_none();
        if let Some(next) = next {
            self.cursor = Some(next);
        }

        Ok(Step::Page { items: count, last })
    }

    /// Steps until the sequence is exhausted or the budget runs out
    pub async fn walk<S: ItemSink + ?Sized>(&mut self, sink: &mut S) -> Result<WalkOutcome, FetchError> {
        loop {
            match self.step(sink).await? {
                Step::Page { last: true, .. } => return Ok(WalkOutcome::Exhausted),
                Step::Page { last: false, .. } => continue,
                Step::Finished(outcome) => return Ok(outcome),
            }
        }
    }
}
