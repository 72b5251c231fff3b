//! Mastodonte: a resumable crawler for paginated fediverse APIs
//!
//! This crate walks cursor-paginated resources (public timelines, follower and
//! following lists) to exhaustion across many instances, checkpointing after
//! every page so an interrupted run picks up where it stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Mastodonte operations
#[derive(Debug, Error)]
pub enum MastodonteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Invalid target: {0}")]
    Target(#[from] state::TargetError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TaskState,
        to: state::TaskState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Mastodonte operations
pub type Result<T> = std::result::Result<T, MastodonteError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{CrawlTarget, Cursor, ResourceKind, TaskState};
pub use storage::{CheckpointRecord, CheckpointStore};
