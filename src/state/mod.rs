//! State module for crawl identities and task progress
//!
//! # Components
//!
//! - `CrawlTarget`: identity of one resumable resource (host, optional handle, kind)
//! - `Cursor`: opaque pagination marker
//! - `TaskState`: the per-target crawl state machine

mod target;
mod task_state;

// Re-export main types
pub use target::{CrawlTarget, Cursor, ResourceKind, TargetError};
pub use task_state::TaskState;
