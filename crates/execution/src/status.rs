//! Run-level status tracking.

use serde::{Deserialize, Serialize};

/// The overall status of a run. Exactly the five states named by the data
/// model — no `paused`/`timed_out` state exists: a wall-clock overrun is a
/// `Failed` run carrying an `IceErrorKind::Timeout` error, and an
/// in-progress cancellation is represented by `Running` plus the separate
/// `cancel_requested` flag on `Run`, not by a sixth status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but not yet started.
    Pending,
    /// Actively running nodes.
    Running,
    /// All nodes completed successfully.
    Succeeded,
    /// At least one node failed fatally and the run could not continue.
    Failed,
    /// The run was cancelled before reaching a success/failure outcome.
    Canceled,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Canceled.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn success_state() {
        assert!(RunStatus::Succeeded.is_success());
        assert!(!RunStatus::Failed.is_success());
    }

    #[test]
    fn serde_rename_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Canceled).unwrap(),
            "\"canceled\""
        );
    }

    #[test]
    fn serde_roundtrip_all_variants() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Canceled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: RunStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, back);
        }
    }
}
