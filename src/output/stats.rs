//! Statistics generation from the checkpoint store
//!
//! This module provides functionality for summarizing crawl progress from
//! the stored checkpoints and printing it.

use crate::state::{CrawlTarget, ResourceKind};
use crate::storage::{CheckpointStore, StorageResult};
use std::collections::BTreeMap;

/// Counts for one resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStatistics {
    pub completed: u64,
    pub in_progress: u64,
    pub items_seen: u64,
}

/// Checkpoint statistics summary
#[derive(Debug, Clone, Default)]
pub struct CheckpointStatistics {
    /// Total number of stored checkpoints
    pub total: u64,

    /// Checkpoints marked completed
    pub completed: u64,

    /// Checkpoints that can still be resumed
    pub in_progress: u64,

    /// Checkpoints that exist but cannot be read
    pub corrupt: Vec<String>,

    /// Sum of `items_seen` over readable checkpoints
    pub items_seen: u64,

    /// Breakdown by resource kind
    pub by_kind: BTreeMap<ResourceKind, KindStatistics>,
}

/// Loads statistics from a checkpoint store
pub fn load_statistics(store: &dyn CheckpointStore) -> StorageResult<CheckpointStatistics> {
    let mut stats = CheckpointStatistics::default();

    for (key, record) in store.list()? {
        stats.total += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%key, error = %e, "unreadable checkpoint");
                stats.corrupt.push(key);
                continue;
            }
        };

        if record.completed {
            stats.completed += 1;
        } else {
            stats.in_progress += 1;
        }
        stats.items_seen += record.items_seen;

        match CrawlTarget::from_key(&key) {
            Ok(target) => {
                let kind = stats.by_kind.entry(target.kind()).or_default();
                if record.completed {
                    kind.completed += 1;
                } else {
                    kind.in_progress += 1;
                }
                kind.items_seen += record.items_seen;
            }
            Err(e) => tracing::warn!(%key, error = %e, "checkpoint key not recognized"),
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CheckpointStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Checkpoints: {}", stats.total);
    println!("  Completed: {}", stats.completed);
    println!("  In progress: {}", stats.in_progress);
    println!("  Items seen: {}", stats.items_seen);
    println!();

    if !stats.by_kind.is_empty() {
        println!("By Resource Kind:");
        for (kind, counts) in &stats.by_kind {
            println!(
                "  {}: {} completed, {} in progress, {} items",
                kind, counts.completed, counts.in_progress, counts.items_seen
            );
        }
        println!();
    }

    if !stats.corrupt.is_empty() {
        println!("Unreadable Checkpoints ({}):", stats.corrupt.len());
        for key in &stats.corrupt {
            println!("  - {}", key);
        }
        println!();
    }

    let completion = if stats.total > 0 {
        (stats.completed as f64 / stats.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Completion: {:.1}% ({} / {} targets)",
        completion, stats.completed, stats.total
    );
}
