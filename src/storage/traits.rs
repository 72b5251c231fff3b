//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::CrawlTarget;
use crate::storage::CheckpointRecord;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// A single record exists but cannot be decoded
    #[error("Checkpoint for '{key}' is unreadable: {reason}")]
    Corrupt { key: String, reason: String },

    /// The shared checkpoint index cannot be decoded at all
    #[error("Checkpoint index {path} is unreadable: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    /// An existing output file cannot be decoded, so appending would lose data
    #[error("Output file {path} is unreadable: {reason}")]
    CorruptOutput { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl StorageError {
    /// Returns true if the error means persisted state exists but is unreadable
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::CorruptIndex { .. } | Self::CorruptOutput { .. }
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable mapping from crawl target to resume state
///
/// Implementations are shared by every worker and must serialize their own
/// mutations: a reader never observes a half-written record, and concurrent
/// writes to different targets never corrupt each other.
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint for a target
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - A readable checkpoint exists
    /// * `Ok(None)` - The target has never been crawled
    /// * `Err(StorageError::Corrupt { .. })` - A checkpoint exists but is unreadable
    fn load(&self, target: &CrawlTarget) -> StorageResult<Option<CheckpointRecord>>;

    /// Stores `record` for `target`, replacing any previous record
    fn save(&self, target: &CrawlTarget, record: &CheckpointRecord) -> StorageResult<()>;

    /// Stores the final record for a target with `completed` forced to true
    fn mark_completed(&self, target: &CrawlTarget, record: &CheckpointRecord) -> StorageResult<()> {
        let mut record = record.clone();
        record.completed = true;
        self.save(target, &record)
    }

    /// Lists every stored checkpoint keyed by target key
    ///
    /// Unreadable records are returned as per-entry errors so one bad record
    /// does not hide the rest.
    fn list(&self) -> StorageResult<Vec<(String, StorageResult<CheckpointRecord>)>>;
}
