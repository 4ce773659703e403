//! Process configuration, layered with `figment` the way
//! `apps/cli` does (`toml` + `env` sources feeding one struct) — narrowed to
//! an env-only layer here, since neither a CLI-flag layer nor a file layer
//! is in scope (§10.2).

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Process-wide configuration, read once at startup from environment
/// variables (`ORG_BUDGET_USD`, `MAX_PARALLEL_DEFAULT`,
/// `EVENT_RETENTION_SECONDS`, `COMPONENT_MANIFEST_PATHS`, `DEV_AUTH_TOKEN`,
/// `CODE_SANDBOX_MEM_MB`, `CODE_SANDBOX_CPU_MS`), falling back to
/// [`RuntimeConfig::default`] for anything unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Hard USD ceiling a single run's pre-flight budget estimate may not
    /// exceed (§4.3 check 6, §4.8 step 2).
    pub org_budget_usd: f64,
    /// Default `max_concurrent_nodes` for a run that doesn't override it via
    /// `options.max_parallel`.
    pub max_parallel_default: usize,
    /// How long the Event Bus retains a run's events for durable replay.
    pub event_retention_seconds: u64,
    /// Comma-separated startup manifest paths, loaded into the Registry at
    /// process start. Empty means no pre-registered bindings.
    pub component_manifest_paths: String,
    /// Shared-secret bearer token a gateway (out of scope here) would check
    /// before accepting a run request. Not consumed by this crate directly —
    /// carried through so a future gateway layer doesn't need its own
    /// config plumbing.
    pub dev_auth_token: Option<String>,
    /// Memory ceiling, in MB, a `code` node's sandbox may use.
    pub code_sandbox_mem_mb: u64,
    /// CPU-time ceiling, in milliseconds, a `code` node's sandbox may use.
    pub code_sandbox_cpu_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            org_budget_usd: 100.0,
            max_parallel_default: 10,
            event_retention_seconds: 3600,
            component_manifest_paths: String::new(),
            dev_auth_token: None,
            code_sandbox_mem_mb: 512,
            code_sandbox_cpu_ms: 30_000,
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration: defaults, then an env-var layer on top. Never
    /// fails on missing env vars (every field has a default); fails only if
    /// a present env var can't parse into its field's type.
    ///
    /// # Errors
    ///
    /// Returns a `figment::Error` if an env var is set but malformed (e.g.
    /// `ORG_BUDGET_USD=notanumber`).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::raw())
            .extract()
    }

    /// Manifest paths split on `,`, trimmed, with empty entries dropped.
    #[must_use]
    pub fn manifest_paths(&self) -> Vec<&str> {
        self.component_manifest_paths
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_env() {
        let config = RuntimeConfig::default();
        assert_eq!(config.org_budget_usd, 100.0);
        assert_eq!(config.max_parallel_default, 10);
        assert!(config.dev_auth_token.is_none());
    }

    #[test]
    fn manifest_paths_splits_and_trims() {
        let config = RuntimeConfig {
            component_manifest_paths: " a.json, b.json ,,c.json".into(),
            ..RuntimeConfig::default()
        };
        assert_eq!(config.manifest_paths(), vec!["a.json", "b.json", "c.json"]);
    }

    #[test]
    fn empty_manifest_paths_is_empty_vec() {
        let config = RuntimeConfig::default();
        assert!(config.manifest_paths().is_empty());
    }
}
