//! Page-level types shared by the walker, the task, and the transports

use crate::state::Cursor;
use crate::storage::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// One fetched item, kept as the server sent it
pub type Item = serde_json::Value;

/// Quota information reported alongside a page
///
/// Both values are optional; not every server sends rate-limit headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHints {
    /// Requests left in the current window
    pub remaining: Option<u32>,

    /// When the window resets
    pub reset_at: Option<DateTime<Utc>>,
}

/// One page of a paginated sequence
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    /// Items in server order
    pub items: Vec<Item>,

    /// Cursor for the following page; `None` ends the sequence
    pub next_cursor: Option<Cursor>,

    pub hints: RateLimitHints,
}

/// Errors raised while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Returns true for failures a later run may get past (network, timeout, 5xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status } => (500..600).contains(status),
            Self::NotFound { .. } | Self::Decode(_) => false,
        }
    }
}

/// Source of pages for one target
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the page after `cursor`, or the first page when `cursor` is `None`
    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<PageResult, FetchError>;

    /// Resolves whatever the fetcher needs before the first page (e.g. an account id)
    ///
    /// Returns `FetchError::NotFound` when the target does not exist remotely.
    async fn resolve(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Consumer of walked items
///
/// `accept` only buffers; items become durable on `flush`, which the crawl
/// task calls before every checkpoint save.
pub trait ItemSink: Send {
    fn accept(&mut self, item: Item);

    fn flush(&mut self) -> StorageResult<()>;
}

impl ItemSink for Vec<Item> {
    fn accept(&mut self, item: Item) {
        self.push(item);
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Status { status: 503 }.is_retryable());
        assert!(!FetchError::Status { status: 403 }.is_retryable());
        assert!(!FetchError::NotFound {
            what: "account".to_string()
        }
        .is_retryable());
        assert!(!FetchError::Decode("not an array".to_string()).is_retryable());
    }
}
