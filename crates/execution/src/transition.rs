//! State machine transition validation for run and node states.

use icecore_workflow::NodeState;

use crate::error::IceError;
use crate::status::RunStatus;

/// Returns `true` if the run-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_run(from: RunStatus, to: RunStatus) -> bool {
    matches!(
        (from, to),
        (RunStatus::Pending, RunStatus::Running)
            | (RunStatus::Pending, RunStatus::Canceled)
            | (RunStatus::Running, RunStatus::Succeeded)
            | (RunStatus::Running, RunStatus::Failed)
            | (RunStatus::Running, RunStatus::Canceled)
    )
}

/// Validate a run-level transition, returning an error if invalid.
pub fn validate_run_transition(from: RunStatus, to: RunStatus) -> Result<(), IceError> {
    if can_transition_run(from, to) {
        Ok(())
    } else {
        Err(IceError::internal(format!(
            "invalid transition from {from} to {to}"
        )))
    }
}

/// Returns `true` if the node-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_node(from: NodeState, to: NodeState) -> bool {
    matches!(
        (from, to),
        (NodeState::Pending, NodeState::Ready)
            | (NodeState::Pending, NodeState::Skipped)
            | (NodeState::Pending, NodeState::Cancelled)
            | (NodeState::Ready, NodeState::Running)
            | (NodeState::Ready, NodeState::Skipped)
            | (NodeState::Ready, NodeState::Cancelled)
            | (NodeState::Running, NodeState::Completed)
            | (NodeState::Running, NodeState::Failed)
            | (NodeState::Running, NodeState::Cancelled)
            | (NodeState::Failed, NodeState::Retrying)
            | (NodeState::Failed, NodeState::Cancelled)
            | (NodeState::Retrying, NodeState::Running)
            | (NodeState::Retrying, NodeState::Failed)
            | (NodeState::Retrying, NodeState::Cancelled)
    )
}

/// Validate a node-level transition, returning an error if invalid.
pub fn validate_node_transition(from: NodeState, to: NodeState) -> Result<(), IceError> {
    if can_transition_node(from, to) {
        Ok(())
    } else {
        Err(IceError::internal(format!(
            "invalid transition from {from} to {to}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_run_transitions() {
        assert!(can_transition_run(RunStatus::Pending, RunStatus::Running));
        assert!(can_transition_run(RunStatus::Running, RunStatus::Succeeded));
        assert!(can_transition_run(RunStatus::Running, RunStatus::Failed));
        assert!(can_transition_run(RunStatus::Running, RunStatus::Canceled));
        assert!(can_transition_run(RunStatus::Pending, RunStatus::Canceled));
    }

    #[test]
    fn invalid_run_transitions() {
        assert!(!can_transition_run(RunStatus::Pending, RunStatus::Succeeded));
        assert!(!can_transition_run(RunStatus::Succeeded, RunStatus::Running));
        assert!(!can_transition_run(RunStatus::Canceled, RunStatus::Running));
        assert!(!can_transition_run(RunStatus::Pending, RunStatus::Pending));
    }

    #[test]
    fn validate_run_transition_err_message() {
        let err = validate_run_transition(RunStatus::Succeeded, RunStatus::Running).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
    }

    #[test]
    fn valid_node_transitions() {
        assert!(can_transition_node(NodeState::Pending, NodeState::Ready));
        assert!(can_transition_node(NodeState::Ready, NodeState::Running));
        assert!(can_transition_node(NodeState::Running, NodeState::Completed));
        assert!(can_transition_node(NodeState::Failed, NodeState::Retrying));
    }

    #[test]
    fn invalid_node_transitions() {
        assert!(!can_transition_node(NodeState::Pending, NodeState::Running));
        assert!(!can_transition_node(NodeState::Completed, NodeState::Running));
        assert!(!can_transition_node(NodeState::Skipped, NodeState::Running));
    }
}
