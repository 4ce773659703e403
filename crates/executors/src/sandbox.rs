use async_trait::async_trait;

use crate::capability::Capability;
use crate::context::NodeExecutionContext;
use crate::error::ExecutorError;
use crate::metadata::ExecutorMetadata;

/// Execution context wrapped with capability enforcement.
///
/// The scheduler wraps a [`NodeExecutionContext`] in a `SandboxedContext`
/// before passing it to untrusted or capability-gated executors — this is
/// mandatory for `code` nodes (`IsolationLevel::Isolated`) and optional for
/// `tool`/`agent` nodes declaring narrower capability requirements.
///
/// Trusted built-in executors (`IsolationLevel::None`) receive a plain
/// `NodeExecutionContext` instead.
pub struct SandboxedContext {
    inner: NodeExecutionContext,
    granted: Vec<Capability>,
}

impl SandboxedContext {
    /// Wrap an existing context with a set of granted capabilities.
    #[must_use]
    pub fn new(inner: NodeExecutionContext, granted: Vec<Capability>) -> Self {
        Self { inner, granted }
    }

    /// Access the underlying context (always available).
    #[must_use]
    pub fn inner(&self) -> &NodeExecutionContext {
        &self.inner
    }

    /// Check whether a specific capability has been granted.
    pub fn check_capability(&self, required: &Capability) -> Result<(), ExecutorError> {
        let granted = self.granted.iter().any(|g| capabilities_match(g, required));
        if granted {
            Ok(())
        } else {
            Err(ExecutorError::SandboxViolation {
                capability: format!("{required:?}"),
                node_id: self.inner.node_id.to_string(),
            })
        }
    }

    /// Check whether network access to a host is allowed.
    pub fn check_network(&self, host: &str) -> Result<(), ExecutorError> {
        let granted = self.granted.iter().any(|g| match g {
            Capability::Network { allowed_hosts } => {
                allowed_hosts.iter().any(|pattern| host_matches(pattern, host))
            }
            _ => false,
        });
        if granted {
            Ok(())
        } else {
            Err(ExecutorError::SandboxViolation {
                capability: format!("Network({host})"),
                node_id: self.inner.node_id.to_string(),
            })
        }
    }

    /// Delegate cancellation check to inner context.
    pub fn check_cancelled(&self) -> Result<(), ExecutorError> {
        self.inner.check_cancelled()
    }
}

/// Port trait for executing node executors within an isolation boundary.
///
/// A `code` node's concrete language runtime (the non-goal-excluded "how do
/// I actually run Python/JS" piece) implements this; the scheduler calls it
/// instead of invoking the executor directly whenever `IsolationLevel` is not
/// `None`.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Execute a node within the sandbox.
    ///
    /// The runner:
    /// 1. Verifies capabilities from `metadata` against the granted set
    /// 2. Enforces resource limits (memory, CPU time, per §6's
    ///    `CODE_SANDBOX_MEM_MB`/`CODE_SANDBOX_CPU_MS`)
    /// 3. Invokes the node
    /// 4. Validates output size
    async fn execute(
        &self,
        context: SandboxedContext,
        metadata: &ExecutorMetadata,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ExecutorError>;
}

fn capabilities_match(granted: &Capability, required: &Capability) -> bool {
    match (granted, required) {
        (Capability::Credential(g), Capability::Credential(r)) => g == r,
        (Capability::Resource(g), Capability::Resource(r)) => g == r,
        (Capability::MaxMemory(g), Capability::MaxMemory(r)) => g >= r,
        (Capability::MaxCpuTime(g), Capability::MaxCpuTime(r)) => g >= r,
        (Capability::Environment { keys: g }, Capability::Environment { keys: r }) => {
            r.iter().all(|rk| g.contains(rk))
        }
        (Capability::Network { allowed_hosts: g }, Capability::Network { allowed_hosts: r }) => {
            r.iter().all(|rh| g.iter().any(|gh| host_matches(gh, rh)))
        }
        (
            Capability::FileSystem {
                paths: g_paths,
                read_only: g_ro,
            },
            Capability::FileSystem {
                paths: r_paths,
                read_only: r_ro,
            },
        ) => {
            if *g_ro && !r_ro {
                return false;
            }
            r_paths.iter().all(|rp| g_paths.iter().any(|gp| rp.starts_with(gp)))
        }
        _ => false,
    }
}

/// Supports `*` wildcard prefix (e.g. `"*.example.com"` matches `"api.example.com"`).
fn host_matches(pattern: &str, host: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        host == suffix || host.ends_with(&format!(".{suffix}"))
    } else {
        pattern == host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icecore_core::{BlueprintId, NodeId, RunId};
    use std::time::Duration;

    fn test_sandboxed(caps: Vec<Capability>) -> SandboxedContext {
        let ctx = NodeExecutionContext::new(RunId::v4(), NodeId::v4(), BlueprintId::v4());
        SandboxedContext::new(ctx, caps)
    }

    #[test]
    fn credential_check_granted() {
        let ctx = test_sandboxed(vec![Capability::Credential("github-token".into())]);
        assert!(ctx.check_capability(&Capability::Credential("github-token".into())).is_ok());
    }

    #[test]
    fn credential_check_denied() {
        let ctx = test_sandboxed(vec![Capability::Credential("github-token".into())]);
        let err = ctx
            .check_capability(&Capability::Credential("aws-secret".into()))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::SandboxViolation { .. }));
    }

    #[test]
    fn network_wildcard_match() {
        let ctx = test_sandboxed(vec![Capability::Network {
            allowed_hosts: vec!["*.example.com".into()],
        }]);
        assert!(ctx.check_network("api.example.com").is_ok());
        assert!(ctx.check_network("example.com").is_ok());
        assert!(ctx.check_network("evil.com").is_err());
    }

    #[test]
    fn network_exact_match() {
        let ctx = test_sandboxed(vec![Capability::Network {
            allowed_hosts: vec!["api.github.com".into()],
        }]);
        assert!(ctx.check_network("api.github.com").is_ok());
        assert!(ctx.check_network("github.com").is_err());
    }

    #[test]
    fn max_memory_sufficient() {
        let granted = Capability::MaxMemory(512 * 1024 * 1024);
        let required = Capability::MaxMemory(256 * 1024 * 1024);
        assert!(capabilities_match(&granted, &required));
    }

    #[test]
    fn max_memory_insufficient() {
        let granted = Capability::MaxMemory(128 * 1024 * 1024);
        let required = Capability::MaxMemory(256 * 1024 * 1024);
        assert!(!capabilities_match(&granted, &required));
    }

    #[test]
    fn max_cpu_time_sufficient() {
        let granted = Capability::MaxCpuTime(Duration::from_secs(60));
        let required = Capability::MaxCpuTime(Duration::from_secs(30));
        assert!(capabilities_match(&granted, &required));
    }

    #[test]
    fn filesystem_read_only_blocks_write() {
        let granted = Capability::FileSystem {
            paths: vec!["/data".into()],
            read_only: true,
        };
        let required = Capability::FileSystem {
            paths: vec!["/data/file.txt".into()],
            read_only: false,
        };
        assert!(!capabilities_match(&granted, &required));
    }

    #[test]
    fn cancellation_delegates_to_inner() {
        let ctx = test_sandboxed(vec![]);
        assert!(ctx.check_cancelled().is_ok());
        ctx.inner().cancellation.cancel();
        assert!(ctx.check_cancelled().is_err());
    }
}
