//! In-memory fetchers, sinks, and stores for crawler unit tests

use crate::crawler::page::{
    FetchError, Item, ItemSink, PageFetcher, PageResult, RateLimitHints,
};
use crate::state::{CrawlTarget, Cursor};
use crate::storage::{CheckpointRecord, CheckpointStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Serves a fixed script of pages and records every cursor it was asked for
///
/// Once the script runs out it serves empty pages.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<PageResult, FetchError>>>,
    requested: Mutex<Vec<Option<String>>>,
    requested_at: Mutex<Vec<Instant>>,
    resolve_error: Option<FetchError>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, items: Vec<Item>, next: Option<&str>) -> Self {
        self.page_with_hints(items, next, RateLimitHints::default())
    }

    pub fn page_with_hints(self, items: Vec<Item>, next: Option<&str>, hints: RateLimitHints) -> Self {
        self.script.lock().unwrap().push_back(Ok(PageResult {
            items,
            next_cursor: next.map(Cursor::new),
            hints,
        }));
        self
    }

    pub fn failure(self, error: FetchError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn not_found(mut self) -> Self {
        self.resolve_error = Some(FetchError::NotFound {
            what: "account".to_string(),
        });
        self
    }

    pub fn requested(&self) -> Vec<Option<String>> {
        self.requested.lock().unwrap().clone()
    }

    /// When each request was made, in request order
    pub fn requested_at(&self) -> Vec<Instant> {
        self.requested_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<PageResult, FetchError> {
        self.requested
            .lock()
            .unwrap()
            .push(cursor.map(|c| c.as_str().to_string()));
        self.requested_at.lock().unwrap().push(Instant::now());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PageResult::default()))
    }

    async fn resolve(&mut self) -> Result<(), FetchError> {
        match self.resolve_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Arc-shared fetcher so tests can inspect requests after the task consumed it
#[async_trait]
impl PageFetcher for Arc<ScriptedFetcher> {
    async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<PageResult, FetchError> {
        self.as_ref().fetch_page(cursor).await
    }
}

/// Sink whose contents stay visible after the task is dropped
#[derive(Clone, Default)]
pub struct SharedSink {
    pub items: Arc<Mutex<Vec<Item>>>,
    pub flushes: Arc<Mutex<usize>>,
}

impl SharedSink {
    pub fn items(&self) -> Vec<Item> {
        self.items.lock().unwrap().clone()
    }
}

impl ItemSink for SharedSink {
    fn accept(&mut self, item: Item) {
        self.items.lock().unwrap().push(item);
    }

    fn flush(&mut self) -> StorageResult<()> {
        *self.flushes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Checkpoint store that keeps every saved record and can be told to fail
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, CheckpointRecord>>,
    history: Mutex<Vec<CheckpointRecord>>,
    fail_on_save: Mutex<Option<usize>>,
    corrupt: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, target: &CrawlTarget, record: CheckpointRecord) -> Self {
        self.records.lock().unwrap().insert(target.key(), record);
        self
    }

    /// Makes the `n`th save (1-based) fail
    pub fn failing_save(self, n: usize) -> Self {
        *self.fail_on_save.lock().unwrap() = Some(n);
        self
    }

    pub fn corrupted(self) -> Self {
        *self.corrupt.lock().unwrap() = true;
        self
    }

    pub fn record(&self, target: &CrawlTarget) -> Option<CheckpointRecord> {
        self.records.lock().unwrap().get(&target.key()).cloned()
    }

    pub fn history(&self) -> Vec<CheckpointRecord> {
        self.history.lock().unwrap().clone()
    }
}

impl CheckpointStore for MemoryStore {
    fn load(&self, target: &CrawlTarget) -> StorageResult<Option<CheckpointRecord>> {
        if *self.corrupt.lock().unwrap() {
            return Err(StorageError::Corrupt {
                key: target.key(),
                reason: "garbage".to_string(),
            });
        }
        Ok(self.record(target))
    }

    fn save(&self, target: &CrawlTarget, record: &CheckpointRecord) -> StorageResult<()> {
        let mut history = self.history.lock().unwrap();
        if *self.fail_on_save.lock().unwrap() == Some(history.len() + 1) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        history.push(record.clone());
        self.records
            .lock()
            .unwrap()
            .insert(target.key(), record.clone());
        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<(String, StorageResult<CheckpointRecord>)>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), Ok(v.clone())))
            .collect())
    }
}

/// `count` JSON items numbered from `start`
pub fn numbered(start: u64, count: u64) -> Vec<Item> {
    (start..start + count)
        .map(|id| serde_json::json!({ "id": id.to_string() }))
        .collect()
}
