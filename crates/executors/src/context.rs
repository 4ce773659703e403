use std::sync::Arc;

use icecore_core::{BlueprintId, NodeId, RunId};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;

/// Runtime context provided to every node executor during execution.
///
/// Constructed by the scheduler before invoking an executor. Provides
/// identity information (which run, blueprint, and node this is), run-scoped
/// variables, and a cancellation token.
///
/// Executors **must** periodically call [`check_cancelled`](Self::check_cancelled)
/// in long-running loops (`agent`, `loop`, `recursive`) to support cooperative
/// cancellation.
#[non_exhaustive]
pub struct NodeExecutionContext {
    /// Unique run identifier.
    pub run_id: RunId,
    /// Node in the blueprint's DAG being executed.
    pub node_id: NodeId,
    /// Blueprint this run was compiled from.
    pub blueprint_id: BlueprintId,
    /// Cancellation signal — checked cooperatively by executors.
    pub cancellation: CancellationToken,
    /// Shared run-scoped variables.
    variables: Arc<RwLock<serde_json::Map<String, serde_json::Value>>>,
}

impl NodeExecutionContext {
    /// Create a new context with the given identifiers.
    #[must_use]
    pub fn new(run_id: RunId, node_id: NodeId, blueprint_id: BlueprintId) -> Self {
        Self {
            run_id,
            node_id,
            blueprint_id,
            cancellation: CancellationToken::new(),
            variables: Arc::new(RwLock::new(serde_json::Map::new())),
        }
    }

    /// Create a context with a pre-existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Create a context with pre-populated variables.
    #[must_use]
    pub fn with_variables(mut self, vars: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = Arc::new(RwLock::new(vars));
        self
    }

    /// Read a variable from the run scope.
    #[must_use]
    pub fn get_variable(&self, key: &str) -> Option<serde_json::Value> {
        self.variables.read().get(key).cloned()
    }

    /// Write a variable to the run scope. Overwrites any existing value.
    pub fn set_variable(&self, key: &str, value: serde_json::Value) {
        self.variables.write().insert(key.to_owned(), value);
    }

    /// Remove a variable from the run scope, returning the previous value.
    pub fn remove_variable(&self, key: &str) -> Option<serde_json::Value> {
        self.variables.write().remove(key)
    }

    /// Check whether execution has been cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Cancelled`] if the token has been triggered.
    pub fn check_cancelled(&self) -> Result<(), ExecutorError> {
        if self.cancellation.is_cancelled() {
            Err(ExecutorError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for NodeExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutionContext")
            .field("run_id", &self.run_id)
            .field("node_id", &self.node_id)
            .field("blueprint_id", &self.blueprint_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> NodeExecutionContext {
        NodeExecutionContext::new(RunId::v4(), NodeId::v4(), BlueprintId::v4())
    }

    #[test]
    fn get_set_variable() {
        let ctx = test_context();
        assert!(ctx.get_variable("count").is_none());

        ctx.set_variable("count", serde_json::json!(42));
        assert_eq!(ctx.get_variable("count"), Some(serde_json::json!(42)));
    }

    #[test]
    fn overwrite_variable() {
        let ctx = test_context();
        ctx.set_variable("name", serde_json::json!("alice"));
        ctx.set_variable("name", serde_json::json!("bob"));
        assert_eq!(ctx.get_variable("name"), Some(serde_json::json!("bob")));
    }

    #[test]
    fn remove_variable() {
        let ctx = test_context();
        ctx.set_variable("temp", serde_json::json!(true));
        let old = ctx.remove_variable("temp");
        assert_eq!(old, Some(serde_json::json!(true)));
        assert!(ctx.get_variable("temp").is_none());
    }

    #[test]
    fn check_cancelled_ok() {
        let ctx = test_context();
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn check_cancelled_after_cancel() {
        let ctx = test_context();
        ctx.cancellation.cancel();
        let err = ctx.check_cancelled().unwrap_err();
        assert!(matches!(err, ExecutorError::Cancelled));
    }

    #[test]
    fn with_cancellation_token() {
        let token = CancellationToken::new();
        let child = token.child_token();
        let ctx = test_context().with_cancellation(child);
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(ctx.check_cancelled().is_err());
    }

    #[test]
    fn with_variables() {
        let mut vars = serde_json::Map::new();
        vars.insert("preset".into(), serde_json::json!("value"));
        let ctx = test_context().with_variables(vars);
        assert_eq!(ctx.get_variable("preset"), Some(serde_json::json!("value")));
    }

    #[test]
    fn debug_format() {
        let ctx = test_context();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("NodeExecutionContext"));
        assert!(debug.contains("run_id"));
    }
}
