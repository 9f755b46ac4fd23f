//! Batch records as seen by the registry.
//!
//! Batches are owned by the storage layer; the registry only reads them during
//! crash recovery and transitions the in-flight ones. The full batch lifecycle
//! (scheduling, CI polling, merge) lives in the batcher itself.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{BatchId, PrNumber, ProjectId};

/// Lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Queued; CI has not started. Safe to delete outright.
    Waiting,
    /// CI in flight. Must be canceled, not deleted, so its PRs are released.
    Running,
    /// All PRs in the batch merged.
    Complete,
    /// Canceled before completion (operator action or crash recovery).
    Canceled,
    /// CI or merge failed.
    Error,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchState::Waiting => "waiting",
            BatchState::Running => "running",
            BatchState::Complete => "complete",
            BatchState::Canceled => "canceled",
            BatchState::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A group of pull requests tested together as one CI/merge unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Storage identity of the batch.
    pub id: BatchId,

    /// The project this batch belongs to.
    pub project: ProjectId,

    /// Current lifecycle state.
    pub state: BatchState,

    /// Pull requests in the batch, in queue order.
    pub prs: Vec<PrNumber>,
}

impl Batch {
    /// Creates a batch record.
    pub fn new(
        id: impl Into<BatchId>,
        project: impl Into<ProjectId>,
        state: BatchState,
        prs: impl IntoIterator<Item = u64>,
    ) -> Self {
        Batch {
            id: id.into(),
            project: project.into(),
            state,
            prs: prs.into_iter().map(PrNumber).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display_is_snake_case() {
        assert_eq!(BatchState::Waiting.to_string(), "waiting");
        assert_eq!(BatchState::Running.to_string(), "running");
        assert_eq!(BatchState::Canceled.to_string(), "canceled");
    }

    #[test]
    fn new_preserves_pr_order() {
        let batch = Batch::new(1, 42, BatchState::Waiting, [20, 21]);
        assert_eq!(batch.prs, vec![PrNumber(20), PrNumber(21)]);
    }
}
