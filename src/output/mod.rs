//! Output module for collected items and crawl summaries
//!
//! This module handles:
//! - Appending each target's items to its JSON output file
//! - Summarizing checkpoint progress for the `stats` command

mod sink;
pub mod stats;

pub use sink::JsonFileSink;
pub use stats::{load_statistics, print_statistics, CheckpointStatistics, KindStatistics};
