//! Runtime execution context (non-serializable).

use std::collections::HashMap;
use std::sync::Arc;

use icecore_core::{NodeId, RunId};
use icecore_executors::budget::ExecutionBudget;
use icecore_workflow::Blueprint;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::IceError;
use crate::output::NodeOutput;

/// Runtime context for an executing run.
///
/// This type is NOT serializable — it holds runtime resources like
/// Arc-wrapped shared state and cancellation tokens. Persistent state is
/// tracked by [`RunState`](crate::state::RunState).
#[derive(Debug)]
pub struct RunContext {
    /// Unique identifier for this run.
    pub run_id: RunId,
    /// The blueprint being executed.
    pub blueprint: Arc<Blueprint>,
    /// Per-node outputs, populated as nodes complete.
    pub node_outputs: Arc<RwLock<HashMap<NodeId, NodeOutput>>>,
    /// Token for cooperative cancellation.
    pub cancellation: CancellationToken,
    /// Run-level variables shared across nodes.
    pub variables: Arc<RwLock<serde_json::Map<String, serde_json::Value>>>,
    /// Resource budget for this run.
    pub budget: ExecutionBudget,
}

impl RunContext {
    /// Create a new run context.
    #[must_use]
    pub fn new(run_id: RunId, blueprint: Arc<Blueprint>, budget: ExecutionBudget) -> Self {
        Self {
            run_id,
            blueprint,
            node_outputs: Arc::new(RwLock::new(HashMap::new())),
            cancellation: CancellationToken::new(),
            variables: Arc::new(RwLock::new(serde_json::Map::new())),
            budget,
        }
    }

    /// Replace the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Set initial variables.
    #[must_use]
    pub fn with_variables(self, vars: serde_json::Map<String, serde_json::Value>) -> Self {
        *self.variables.write() = vars;
        self
    }

    /// Store a node's output.
    pub fn set_node_output(&self, node_id: NodeId, output: NodeOutput) {
        self.node_outputs.write().insert(node_id, output);
    }

    /// Retrieve a node's output.
    #[must_use]
    pub fn get_node_output(&self, node_id: NodeId) -> Option<NodeOutput> {
        self.node_outputs.read().get(&node_id).cloned()
    }

    /// Set a run variable.
    pub fn set_variable(&self, key: impl Into<String>, value: serde_json::Value) {
        self.variables.write().insert(key.into(), value);
    }

    /// Get a run variable.
    #[must_use]
    pub fn get_variable(&self, key: &str) -> Option<serde_json::Value> {
        self.variables.read().get(key).cloned()
    }

    /// Check if cancellation has been requested, returning `IceErrorKind::Cancelled` if so.
    pub fn check_cancelled(&self) -> Result<(), IceError> {
        if self.cancellation.is_cancelled() {
            Err(IceError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Total output bytes across all completed nodes.
    #[must_use]
    pub fn total_output_bytes(&self) -> u64 {
        self.node_outputs.read().values().map(|o| o.bytes).sum()
    }

    /// Snapshots this context's node outputs and variables into an
    /// independent copy — used to give each concurrent `loop`/`parallel`/
    /// `recursive` iteration its own isolated view so siblings running at
    /// the same time never race on a shared binding.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            run_id: self.run_id,
            blueprint: Arc::clone(&self.blueprint),
            node_outputs: Arc::new(RwLock::new(self.node_outputs.read().clone())),
            cancellation: self.cancellation.clone(),
            variables: Arc::new(RwLock::new(self.variables.read().clone())),
            budget: self.budget.clone(),
        }
    }

    /// [`Self::fork`] with `key` additionally bound to `value` in the
    /// fork's own variables — the `loop` driver's way of handing each item
    /// its `loop_variable` without mutating the parent's shared state.
    #[must_use]
    pub fn fork_with_variable(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let forked = self.fork();
        forked.set_variable(key, value);
        forked
    }
}
