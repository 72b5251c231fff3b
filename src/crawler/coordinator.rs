//! Crawler coordinator - wiring between configuration and crawl tasks
//!
//! This module builds the shared pieces every task needs (checkpoint store,
//! rate limiter, HTTP client), turns a target into a concrete `CrawlTask`
//! with the right fetcher and output sink, and hands target lists to the
//! scheduler.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, AccountListFetcher, TimelineFetcher};
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::scheduler::{RunReport, Scheduler};
use crate::crawler::task::{CrawlTask, TaskOutcome, TaskSettings};
use crate::crawler::walker::WalkSettings;
use crate::output::JsonFileSink;
use crate::state::{CrawlTarget, ResourceKind};
use crate::storage::{open_checkpoint_store, CheckpointStore};
use reqwest::Client;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Per-invocation crawl options (the CLI flags)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Page budget per target per invocation
    pub max_pages: u32,

    /// Only statuses local to the instance (timelines)
    pub local: bool,

    /// Attach reblogging accounts to statuses (timelines)
    pub reblogs: bool,

    /// Continue from stored checkpoints instead of re-crawling
    pub resume: bool,

    /// Remaining-quota threshold for the rate-limit gate
    pub tolerance: u32,
}

impl CrawlOptions {
    /// Options taken from the configuration defaults
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.crawler.max_pages,
            local: true,
            reblogs: false,
            resume: false,
            tolerance: config.crawler.rate_limit_tolerance,
        }
    }
}

/// Main crawler coordinator structure
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<Config>,
    store: Arc<dyn CheckpointStore>,
    limiter: Arc<RateLimiter>,
    client: Client,
}

impl Coordinator {
    /// Creates a coordinator using the checkpoint backend named in `config`
    pub fn new(config: Config) -> crate::Result<Self> {
        let store = open_checkpoint_store(&config.output)?;
        Self::with_store(config, store)
    }

    /// Creates a coordinator over an already opened checkpoint store
    pub fn with_store(config: Config, store: Arc<dyn CheckpointStore>) -> crate::Result<Self> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;

        Ok(Self {
            config: Arc::new(config),
            store,
            limiter: Arc::new(RateLimiter::new()),
            client,
        })
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    fn task_settings(&self, options: &CrawlOptions) -> TaskSettings {
        TaskSettings {
            walk: WalkSettings {
                max_pages: options.max_pages,
                tolerance: options.tolerance,
                politeness_delay: Duration::from_millis(self.config.crawler.politeness_delay_ms),
            },
            resume: options.resume,
        }
    }

    /// Crawls one target to a terminal state
    pub async fn crawl_one(&self, target: CrawlTarget, options: &CrawlOptions) -> TaskOutcome {
        let settings = self.task_settings(options);
        let sink = JsonFileSink::for_target(Path::new(&self.config.output.data_dir), &target);
        let store = Arc::clone(&self.store);
        let limiter = Arc::clone(&self.limiter);

        tracing::info!(key = %target, resume = options.resume, "crawling target");

        match target.kind() {
            ResourceKind::Timeline => {
                let fetcher = match TimelineFetcher::new(
                    self.client.clone(),
                    &self.config.api,
                    &target,
                    self.config.crawler.page_limit,
                    options.local,
                ) {
                    Ok(fetcher) => fetcher,
                    Err(e) => return setup_failed(&target, e),
                };
                let fetcher = if options.reblogs {
                    fetcher.with_rebloggers(Arc::clone(&self.limiter), settings.walk)
                } else {
                    fetcher
                };

                CrawlTask::new(target, store, limiter, fetcher, sink, settings)
                    .run()
                    .await
            }
            ResourceKind::Followers | ResourceKind::Following => {
                let fetcher = match AccountListFetcher::new(
                    self.client.clone(),
                    &self.config.api,
                    &target,
                    self.config.crawler.follow_page_limit,
                ) {
                    Ok(fetcher) => fetcher,
                    Err(e) => return setup_failed(&target, e),
                };

                CrawlTask::new(target, store, limiter, fetcher, sink, settings)
                    .run()
                    .await
            }
        }
    }

    /// Crawls every target across `workers` concurrent workers
    pub async fn crawl_many(
        &self,
        targets: Vec<CrawlTarget>,
        workers: usize,
        options: CrawlOptions,
    ) -> RunReport {
        let coordinator = self.clone();

        Scheduler::new(workers)
            .run(targets, move |target| {
                let coordinator = coordinator.clone();
                async move { coordinator.crawl_one(target, &options).await }
            })
            .await
    }
}

fn setup_failed(target: &CrawlTarget, error: impl std::fmt::Display) -> TaskOutcome {
    tracing::error!(key = %target, error = %error, "could not set up fetcher");
    TaskOutcome::Failed {
        reason: error.to_string(),
    }
}

/// Reads a target list: one identity per line
///
/// Blank lines and lines starting with `#` are skipped. Malformed and
/// duplicate identities are logged and skipped.
pub fn load_targets(path: &Path, kind: ResourceKind) -> crate::Result<Vec<CrawlTarget>> {
    let content = fs::read_to_string(path)?;
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match CrawlTarget::parse(kind, line) {
            Ok(target) => {
                if seen.insert(target.key()) {
                    targets.push(target);
                } else {
                    tracing::warn!(line = index + 1, %target, "duplicate target skipped");
                }
            }
            Err(e) => {
                tracing::warn!(line = index + 1, value = line, error = %e, "malformed target skipped");
            }
        }
    }

    tracing::info!(path = %path.display(), count = targets.len(), %kind, "targets loaded");
    Ok(targets)
}
