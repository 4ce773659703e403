//! Per-node lifecycle state, shared by the execution state machine and the
//! scheduler's bookkeeping.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single node within a running [`crate::plan::Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Declared but not yet eligible to run (dependencies unmet).
    Pending,
    /// All dependencies satisfied; waiting for a scheduler slot.
    Ready,
    /// Currently executing.
    Running,
    /// A prior attempt failed and a retry has been scheduled.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Exhausted retries or hit a fatal error.
    Failed,
    /// Never ran because an upstream dependency failed or a `when` guard
    /// evaluated false.
    Skipped,
    /// Aborted due to run cancellation.
    Cancelled,
}

impl NodeState {
    /// Returns `true` if this state will never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Returns `true` if the node is currently occupying a scheduler slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Retrying)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
