//! JSON checkpoint index
//!
//! All targets share one index file mapping target keys to records. Every
//! mutation is a read-modify-write of the whole file, so the store holds an
//! internal lock for the duration and replaces the file atomically.

use crate::state::CrawlTarget;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::{write_atomically, CheckpointRecord};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the index inside the state directory
pub const INDEX_FILE: &str = "checkpoints.json";

/// Checkpoint store backed by a single JSON index file
pub struct JsonCheckpointStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCheckpointStore {
    /// Uses the index inside `dir`, creating the directory if needed
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self::at(dir.join(INDEX_FILE)))
    }

    /// Uses an explicit index file path
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_index(&self) -> StorageResult<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| StorageError::CorruptIndex {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_index(&self, index: &Map<String, Value>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(index)?;
        write_atomically(&self.path, &bytes)?;
        Ok(())
    }
}

fn decode_record(key: &str, value: Value) -> StorageResult<CheckpointRecord> {
    serde_json::from_value(value).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self, target: &CrawlTarget) -> StorageResult<Option<CheckpointRecord>> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let key = target.key();

        match self.read_index()?.remove(&key) {
            Some(value) => decode_record(&key, value).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, target: &CrawlTarget, record: &CheckpointRecord) -> StorageResult<()> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;

        // A corrupt index is surfaced rather than overwritten
        let mut index = self.read_index()?;
        index.insert(target.key(), serde_json::to_value(record)?);
        self.write_index(&index)?;

        tracing::trace!(key = %target, ?record, "checkpoint saved");
        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<(String, StorageResult<CheckpointRecord>)>> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;

        Ok(self
            .read_index()?
            .into_iter()
            .map(|(key, value)| {
                let record = decode_record(&key, value);
                (key, record)
            })
            .collect())
    }
}
