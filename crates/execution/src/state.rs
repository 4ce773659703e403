//! Run and node execution state tracking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use icecore_core::{BlueprintId, NodeId, RunId};
use icecore_workflow::NodeState;
use serde::{Deserialize, Serialize};

use crate::attempt::NodeAttempt;
use crate::error::IceError;
use crate::output::NodeOutput;
use crate::status::RunStatus;
use crate::transition::{validate_node_transition, validate_run_transition};

/// The execution state of a single node within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionState {
    pub state: NodeState,
    pub attempts: Vec<NodeAttempt>,
    #[serde(default)]
    pub current_output: Option<NodeOutput>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl NodeExecutionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: NodeState::Pending,
            attempts: Vec::new(),
            current_output: None,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    #[must_use]
    pub fn latest_attempt(&self) -> Option<&NodeAttempt> {
        self.attempts.last()
    }

    /// Transition to a new state, validating the transition and stamping
    /// `scheduled_at`/`started_at`/`completed_at` as appropriate.
    pub fn transition_to(&mut self, new_state: NodeState) -> Result<(), IceError> {
        validate_node_transition(self.state, new_state)?;
        self.state = new_state;

        if new_state == NodeState::Ready {
            self.scheduled_at = Some(Utc::now());
        }
        if new_state == NodeState::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if new_state.is_terminal() {
            self.completed_at = Some(Utc::now());
        }

        Ok(())
    }
}

impl Default for NodeExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete execution state of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub blueprint_id: BlueprintId,
    pub status: RunStatus,
    pub node_states: HashMap<NodeId, NodeExecutionState>,
    /// Optimistic-concurrency version, bumped on each status change.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Separate from `status`: a cancellation can be requested while the run
    /// is still `Running`, ahead of the in-flight nodes actually draining.
    #[serde(default)]
    pub cancel_requested: bool,
    pub total_retries: u32,
    pub total_output_bytes: u64,
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
}

impl RunState {
    #[must_use]
    pub fn new(run_id: RunId, blueprint_id: BlueprintId, node_ids: &[NodeId]) -> Self {
        let now = Utc::now();
        let mut node_states = HashMap::new();
        for &nid in node_ids {
            node_states.insert(nid, NodeExecutionState::new());
        }

        Self {
            run_id,
            blueprint_id,
            status: RunStatus::Pending,
            node_states,
            version: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancel_requested: false,
            total_retries: 0,
            total_output_bytes: 0,
            variables: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn node_state(&self, node_id: NodeId) -> Option<&NodeExecutionState> {
        self.node_states.get(&node_id)
    }

    pub fn set_node_state(&mut self, node_id: NodeId, state: NodeExecutionState) {
        self.node_states.insert(node_id, state);
    }

    #[must_use]
    pub fn all_nodes_terminal(&self) -> bool {
        self.node_states.values().all(|ns| ns.state.is_terminal())
    }

    #[must_use]
    pub fn active_node_ids(&self) -> Vec<NodeId> {
        self.node_states
            .iter()
            .filter(|(_, ns)| ns.state.is_active())
            .map(|(&id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn completed_node_ids(&self) -> Vec<NodeId> {
        self.node_states
            .iter()
            .filter(|(_, ns)| ns.state == NodeState::Completed)
            .map(|(&id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn failed_node_ids(&self) -> Vec<NodeId> {
        self.node_states
            .iter()
            .filter(|(_, ns)| ns.state == NodeState::Failed)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Records a cancellation request without changing `status` — the
    /// Scheduler is what eventually drives `status` to `Canceled` once
    /// in-flight nodes drain.
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Transition the run status, validating the transition and bumping
    /// `version`.
    pub fn transition_status(&mut self, new_status: RunStatus) -> Result<(), IceError> {
        validate_run_transition(self.status, new_status)?;
        self.status = new_status;
        self.version += 1;
        self.updated_at = Utc::now();

        if new_status == RunStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }

        Ok(())
    }
}
