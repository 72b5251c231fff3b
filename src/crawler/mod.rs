//! Crawler module for walking paginated APIs to exhaustion
//!
//! This module contains the core crawling logic, including:
//! - The cursor-following page walker
//! - The per-target checkpoint/resume state machine
//! - Per-host rate-limit gating
//! - Round-robin partitioning and the worker pool
//! - The HTTP transport for Mastodon-compatible servers

mod coordinator;
mod fetcher;
mod page;
mod partition;
mod rate_limit;
mod scheduler;
mod task;
mod walker;

#[cfg(test)]
mod test_support;

pub use coordinator::{load_targets, Coordinator, CrawlOptions};
pub use fetcher::{
    build_http_client, extract_rate_limit_hints, parse_next_link, AccountListFetcher,
    ApiEndpoint, TimelineFetcher,
};
pub use page::{FetchError, Item, ItemSink, PageFetcher, PageResult, RateLimitHints};
pub use partition::partition;
pub use rate_limit::RateLimiter;
pub use scheduler::{RunReport, Scheduler};
pub use task::{CrawlTask, TaskOutcome, TaskSettings};
pub use walker::{PageWalker, Step, WalkOutcome, WalkSettings};
