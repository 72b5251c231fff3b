//! Per-target JSON output files
//!
//! Each target accumulates its items in one JSON array under the data
//! directory. Items are buffered in memory and appended on `flush` by reading
//! the existing array, extending it, and replacing the file.

use crate::crawler::{Item, ItemSink};
use crate::state::CrawlTarget;
use crate::storage::{write_atomically, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Appends a target's items to `<data-dir>/<kind dir>/<identity>.json`
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    pending: Vec<Item>,
}

impl JsonFileSink {
    /// Sink writing to an explicit file
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            pending: Vec::new(),
        }
    }

    /// Sink for `target` under `data_dir`
    pub fn for_target(data_dir: &Path, target: &CrawlTarget) -> Self {
        let path = data_dir
            .join(target.kind().output_dir())
            .join(format!("{}.json", target.identity()));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of items accepted since the last flush
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn read_existing(&self) -> StorageResult<Vec<Item>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| StorageError::CorruptOutput {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl ItemSink for JsonFileSink {
    fn accept(&mut self, item: Item) {
        self.pending.push(item);
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        // An unreadable file fails the flush; it is never truncated
        let mut items = self.read_existing()?;
        let added = self.pending.len();
        items.append(&mut self.pending);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomically(&self.path, &serde_json::to_vec(&items)?)?;

        tracing::debug!(path = %self.path.display(), added, total = items.len(), "output flushed");
        Ok(())
    }
}
