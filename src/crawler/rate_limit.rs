//! Per-host rate-limit gate
//!
//! Servers report how many requests remain in the current window and when the
//! window resets. Once the remaining quota drops to the configured tolerance,
//! the worker about to talk to that host sleeps until the reset time. The
//! server's reset time is authoritative: no jitter, no exponential backoff.

use crate::crawler::page::RateLimitHints;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Last quota information seen for one host
#[derive(Debug, Clone, Copy, Default)]
struct RateLimitState {
    remaining: Option<u32>,
    reset_at: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// How long a caller must wait before spending more quota
    fn required_wait(&self, tolerance: u32, now: DateTime<Utc>) -> Duration {
        match (self.remaining, self.reset_at) {
            (Some(remaining), Some(reset_at)) if remaining <= tolerance => {
                (reset_at - now).to_std().unwrap_or(Duration::ZERO)
            }
            _ => Duration::ZERO,
        }
    }
}

/// Host-keyed rate-limit state shared by every worker
///
/// Each host has its own async lock, so workers crawling different hosts
/// never wait on each other, while targets sharing a host serialize their
/// gate and observe calls.
#[derive(Debug, Default)]
pub struct RateLimiter {
    hosts: Mutex<HashMap<String, Arc<tokio::sync::Mutex<RateLimitState>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn host_state(&self, host: &str) -> Arc<tokio::sync::Mutex<RateLimitState>> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(hosts.entry(host.to_string()).or_default())
    }

    /// Records the quota reported by the latest response from `host`
    ///
    /// Responses without any hint leave the previous state untouched.
    pub async fn observe(&self, host: &str, hints: &RateLimitHints) {
        if hints.remaining.is_none() && hints.reset_at.is_none() {
            return;
        }

        let state = self.host_state(host);
        let mut state = state.lock().await;
        state.remaining = hints.remaining;
        state.reset_at = hints.reset_at;

        tracing::debug!(
            host,
            remaining = ?hints.remaining,
            reset_at = ?hints.reset_at,
            "rate limit observed"
        );
    }

    /// Blocks until it is safe to send another request to `host`
    ///
    /// Returns the time spent waiting.
    pub async fn gate(&self, host: &str, tolerance: u32) -> Duration {
        let state = self.host_state(host);
        let mut state = state.lock().await;

        let wait = state.required_wait(tolerance, Utc::now());
        if wait.is_zero() {
            return wait;
        }

        tracing::info!(
            host,
            remaining = ?state.remaining,
            wait_secs = wait.as_secs_f64(),
            "rate limit nearly exhausted, sleeping until reset"
        );

        // The host lock stays held so other workers on this host wait too
        tokio::time::sleep(wait).await;
        state.remaining = None;
        state.reset_at = None;

        wait
    }
}
