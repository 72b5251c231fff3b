//! Storage module for persisting crawl checkpoints
//!
//! This module handles:
//! - The `CheckpointRecord` persisted per crawl target
//! - A JSON index backend (one shared file, atomically replaced)
//! - A SQLite backend (one row per target)
//! - Backend selection from configuration

mod json;
mod schema;
mod sqlite;
mod traits;

pub use json::JsonCheckpointStore;
pub use sqlite::SqliteCheckpointStore;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::config::{CheckpointBackend, OutputConfig};
use crate::state::Cursor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Resume state persisted for one crawl target
///
/// `cursor` is absent until the first page has been recorded. `items_seen`
/// never decreases across saves of a single walk, and once `completed` is
/// true the target is not crawled again unless a re-crawl is forced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    #[serde(default)]
    pub cursor: Option<Cursor>,
    pub items_seen: u64,
    pub completed: bool,
}

impl CheckpointRecord {
    /// Records a processed page: `items` more items, positioned at `cursor`
    ///
    /// A missing cursor (last page of the sequence) keeps the previous one.
    pub fn advance(&mut self, cursor: Option<Cursor>, items: usize) {
        if cursor.is_some() {
            self.cursor = cursor;
        }
        self.items_seen += items as u64;
    }
}

/// Opens the checkpoint backend selected in the output configuration
pub fn open_checkpoint_store(config: &OutputConfig) -> StorageResult<Arc<dyn CheckpointStore>> {
    let dir = Path::new(&config.state_dir);
    fs::create_dir_all(dir)?;

    let store: Arc<dyn CheckpointStore> = match config.checkpoint_backend {
        CheckpointBackend::Json => Arc::new(JsonCheckpointStore::open(dir)?),
        CheckpointBackend::Sqlite => Arc::new(SqliteCheckpointStore::new(
            &dir.join(sqlite::DATABASE_FILE),
        )?),
    };

    Ok(store)
}

/// Replaces `path` with `bytes` so readers see either the old or the new content
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}
