use std::collections::HashMap;
use std::sync::Arc;

use crate::executor::NodeExecutor;
use crate::metadata::ExecutorMetadata;

/// Type-erased registry for discovering and dispatching node executors by key.
///
/// The scheduler populates this at startup and uses it to resolve a node's
/// resolved registry binding (`RegistryEntryId`, looked up by the
/// `icecore-registry` crate) down to a concrete `Arc<dyn NodeExecutor>` it
/// can invoke. This is deliberately a separate, process-local lookup table
/// from the `icecore-registry` crate's `RegistryEntry` data — that crate
/// tracks *what bindings exist*; this one tracks *which Rust type runs them*.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor. Overwrites any existing executor with the same key.
    pub fn register(&mut self, executor: Arc<dyn NodeExecutor>) {
        let key = executor.metadata().key.clone();
        self.executors.insert(key, executor);
    }

    /// Look up an executor by its key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn NodeExecutor>> {
        self.executors.get(key)
    }

    /// Check whether an executor with the given key is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.executors.contains_key(key)
    }

    /// Return metadata for all registered executors.
    #[must_use]
    pub fn list(&self) -> Vec<&ExecutorMetadata> {
        self.executors.values().map(|a| a.metadata()).collect()
    }

    /// Number of registered executors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Returns `true` if no executors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Remove an executor by key. Returns the removed executor, if any.
    pub fn unregister(&mut self, key: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.remove(key)
    }

    /// Iterate over all registered `(key, executor)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn NodeExecutor>)> {
        self.executors.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("count", &self.executors.len())
            .field("keys", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeExecutionContext;
    use crate::error::ExecutorError;
    use async_trait::async_trait;

    struct DummyExecutor(ExecutorMetadata);

    #[async_trait]
    impl NodeExecutor for DummyExecutor {
        fn metadata(&self) -> &ExecutorMetadata {
            &self.0
        }

        async fn execute(
            &self,
            _ctx: &NodeExecutionContext,
            input: serde_json::Value,
        ) -> Result<crate::result::ActionResult<serde_json::Value>, ExecutorError> {
            Ok(crate::result::ActionResult::success(input))
        }
    }

    fn make_executor(key: &str, name: &str) -> Arc<dyn NodeExecutor> {
        Arc::new(DummyExecutor(ExecutorMetadata::new(key, name, "test")))
    }

    #[test]
    fn empty_registry() {
        let reg = ExecutorRegistry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
        assert!(reg.get("anything").is_none());
    }

    #[test]
    fn register_and_get() {
        let mut reg = ExecutorRegistry::new();
        reg.register(make_executor("tool", "Tool Node"));

        assert_eq!(reg.len(), 1);
        let exec = reg.get("tool").unwrap();
        assert_eq!(exec.metadata().key, "tool");
        assert_eq!(exec.metadata().name, "Tool Node");
    }

    #[test]
    fn contains() {
        let mut reg = ExecutorRegistry::new();
        reg.register(make_executor("a", "A"));
        assert!(reg.contains("a"));
        assert!(!reg.contains("b"));
    }

    #[test]
    fn overwrite_existing() {
        let mut reg = ExecutorRegistry::new();
        reg.register(make_executor("x", "Version 1"));
        reg.register(make_executor("x", "Version 2"));

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("x").unwrap().metadata().name, "Version 2");
    }

    #[test]
    fn unregister() {
        let mut reg = ExecutorRegistry::new();
        reg.register(make_executor("temp", "Temporary"));

        let removed = reg.unregister("temp");
        assert!(removed.is_some());
        assert!(reg.is_empty());
        assert!(reg.unregister("temp").is_none());
    }

    #[test]
    fn list_metadata() {
        let mut reg = ExecutorRegistry::new();
        reg.register(make_executor("a", "Executor A"));
        reg.register(make_executor("b", "Executor B"));

        let mut names: Vec<&str> = reg.list().iter().map(|m| m.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Executor A", "Executor B"]);
    }
}
