#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # icecore-runtime
//!
//! Process-level assembly: reads [`config::RuntimeConfig`], initializes the
//! global `tracing` subscriber, wires the nine node executors into one
//! [`icecore_executors::ExecutorRegistry`], and builds the
//! [`controller::RunController`] that drives §4.8's Run Controller algorithm
//! end to end. `icecore-cli` is the only thing downstream of this crate —
//! everything it needs to expose a `run`/`validate`/`register` command line
//! lives here first.

/// Execution request/response types and the Run Controller itself.
pub mod controller;
/// Environment-sourced process configuration.
pub mod config;
/// Wires node-kind executors into an `ExecutorRegistry`.
pub mod executors;
/// Global `tracing` subscriber setup.
pub mod logging;
/// The `Run` data model (§3) and its in-process table.
pub mod run_record;

pub use config::RuntimeConfig;
pub use controller::{BlueprintSource, RunController, RunHandle, RunOptions, RunRequest};
pub use run_record::{RunRecord, RunTable};

use std::sync::Arc;
use std::time::Duration;

use icecore_compiler::FallbackRateTable;
use icecore_eventbus::EventBus;
use icecore_executors::ExpressionEvaluator;
use icecore_expression::MiniLanguageEvaluator;
use icecore_registry::{Manifest, Registry};
use icecore_store::BlueprintStore;

/// Assembles a [`RunController`] from a [`RuntimeConfig`] and a set of
/// optional node-kind [`executors::Drivers`]. This is the one-call path
/// `icecore-cli` uses at startup; [`RunController::new`] is there for callers
/// that need to substitute a component (tests, a real rate table).
///
/// Reads every manifest path in `config.manifest_paths()` as JSON into a
/// [`Manifest`] and pre-populates the returned `Registry` with it — a path
/// that fails to read or parse is logged via `tracing::warn!` and skipped
/// rather than aborting startup, since a partially-seeded registry still
/// lets unrelated blueprints run.
#[must_use]
pub fn build(config: RuntimeConfig, drivers: executors::Drivers) -> RunController {
    let registry = Arc::new(load_registry(&config));
    let store = Arc::new(BlueprintStore::new());
    let events = Arc::new(EventBus::new(
        256,
        Duration::from_secs(config.event_retention_seconds),
    ));

    let evaluator: Arc<dyn ExpressionEvaluator> = Arc::new(MiniLanguageEvaluator::new());
    let executor_registry = Arc::new(executors::build_registry(Arc::clone(&evaluator), &drivers));
    let scheduler = Arc::new(controller::default_scheduler(
        executor_registry,
        Arc::clone(&events),
        evaluator,
    ));

    RunController::new(
        registry,
        store,
        events,
        scheduler,
        Arc::new(FallbackRateTable::default()),
        config,
    )
}

fn load_registry(config: &RuntimeConfig) -> Registry {
    let registry = Registry::new();
    for path in config.manifest_paths() {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Manifest>(&contents) {
                Ok(manifest) => {
                    for entry in manifest.entries {
                        if let Err(err) =
                            registry.register(entry.kind, entry.name.clone(), entry.definition, None)
                        {
                            tracing::warn!(path, name = %entry.name, error = %err, "failed to register manifest entry");
                        }
                    }
                }
                Err(err) => tracing::warn!(path, error = %err, "failed to parse manifest file"),
            },
            Err(err) => tracing::warn!(path, error = %err, "failed to read manifest file"),
        }
    }
    registry
}
