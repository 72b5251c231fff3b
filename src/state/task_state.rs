//! States of a single crawl task
//!
//! A task moves `Init -> [Resuming] -> Crawling <-> Checkpointing` and ends in
//! one of the terminal states `Completed`, `Suspended`, or `Failed`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Loading the checkpoint for the target
    Init,

    /// A prior incomplete checkpoint was found; restoring its cursor
    Resuming,

    /// Fetching the next page
    Crawling,

    /// Persisting progress after a page
    Checkpointing,

    // ===== Terminal States =====
    /// The sequence was walked to exhaustion (or already had been)
    Completed,

    /// The page budget ran out; the checkpoint stays resumable
    Suspended,

    /// This invocation failed; a later run resumes from the saved cursor
    Failed,
}

impl TaskState {
    /// Returns true if no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Suspended | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        match (self, next) {
            (Init, Resuming | Crawling | Completed | Failed) => true,
            (Resuming, Crawling | Failed) => true,
            (Crawling, Checkpointing | Suspended | Failed) => true,
            (Checkpointing, Crawling | Completed | Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Resuming => "resuming",
            Self::Crawling => "crawling",
            Self::Checkpointing => "checkpointing",
            Self::Completed => "completed",
            Self::Suspended => "suspended",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
