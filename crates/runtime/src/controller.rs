//! The Run Controller (§4.8): accepts an execution request, pre-flights
//! budget, instantiates Context + Scheduler, drives execution to terminal
//! state, persists the terminal snapshot. Grounded on
//! `nebula-engine::engine::WorkflowEngine::execute` entry point, split here
//! into the seven steps §4.8 names explicitly rather than one monolithic
//! function, since each step has a distinct failure mode worth naming.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use icecore_compiler::{BudgetEstimate, CompiledPlan, ModelRateTable};
use icecore_core::{BlueprintId, RunId};
use icecore_eventbus::{EventBus, Subscription};
use icecore_execution::context::RunContext;
use icecore_execution::state::RunState;
use icecore_execution::{IceError, RunStatus};
use icecore_executors::budget::ExecutionBudget;
use icecore_executors::ExpressionEvaluator;
use icecore_registry::Registry;
use icecore_scheduler::Scheduler;
use icecore_store::BlueprintStore;
use icecore_workflow::Blueprint;
use parking_lot::RwLock;

use crate::config::RuntimeConfig;
use crate::run_record::{plan_fingerprint, RunRecord, RunTable};

/// Where the blueprint being run comes from (§4.8 step 1's `{blueprint_id |
/// inline blueprint}`).
#[derive(Debug, Clone)]
pub enum BlueprintSource {
    /// A previously-registered, finalized blueprint looked up by id.
    Registered(BlueprintId),
    /// A finalized blueprint supplied directly with the request, never
    /// persisted to the Blueprint Store.
    Inline(Blueprint),
}

/// Per-request overrides layered on top of [`RuntimeConfig`]'s defaults —
/// `options.max_parallel` from the `POST /runs` shape in §6.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub max_parallel: Option<usize>,
}

/// A submitted execution request: `{blueprint_id | inline blueprint, inputs,
/// options}` verbatim from §4.8 step 1.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub source: BlueprintSource,
    pub inputs: serde_json::Map<String, serde_json::Value>,
    pub options: RunOptions,
}

/// What a caller gets back immediately after submitting a run: the id to
/// poll/cancel by, and a subscription to its event stream opened before any
/// node has executed, so no `node.started` event can be missed (§4.8 step
/// 4: "open Event Bus stream, emit `run.started`" — ordered so the open
/// always precedes the emit).
pub struct RunHandle {
    pub run_id: RunId,
    pub events: Subscription,
}

/// Drives runs end to end: compiles or looks up a Plan, pre-flights its
/// budget, and hands it to the Scheduler, persisting the terminal
/// [`RunRecord`] either way.
pub struct RunController {
    registry: Arc<Registry>,
    store: Arc<BlueprintStore>,
    events: Arc<EventBus>,
    scheduler: Arc<Scheduler>,
    rates: Arc<dyn ModelRateTable>,
    runs: Arc<RunTable>,
    /// `RunState` for every run still in flight, so [`Self::cancel`] can
    /// reach the same flag the Scheduler's dispatch loop polls
    /// (`run_state.read().cancel_requested`) rather than only flipping the
    /// bit on the externally-visible [`RunRecord`], which the Scheduler
    /// never looks at.
    active: Arc<DashMap<RunId, Arc<RwLock<RunState>>>>,
    config: RuntimeConfig,
}

impl RunController {
    /// Assembles a controller from its already-built components. Use
    /// [`crate::build`] to construct those components from a
    /// [`RuntimeConfig`] in one step; this constructor is for callers (tests,
    /// `icecore-cli`) that need to substitute a piece — a fake
    /// [`ModelRateTable`], a shared `Registry` pre-populated for a test, etc.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<BlueprintStore>,
        events: Arc<EventBus>,
        scheduler: Arc<Scheduler>,
        rates: Arc<dyn ModelRateTable>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            registry,
            store,
            events,
            scheduler,
            rates,
            runs: Arc::new(RunTable::new()),
            active: Arc::new(DashMap::new()),
            config,
        }
    }

    /// The in-process table of run snapshots this controller persists to.
    #[must_use]
    pub fn runs(&self) -> &Arc<RunTable> {
        &self.runs
    }

    /// Looks up a run's current externally-visible snapshot.
    #[must_use]
    pub fn status(&self, run_id: RunId) -> Option<RunRecord> {
        self.runs.get(run_id)
    }

    /// Cooperatively cancels a run. A no-op (not an error) if `run_id` is
    /// unknown or already terminal — cancellation is inherently racy with
    /// completion, and a caller shouldn't need to distinguish "too late" from
    /// "never existed".
    pub fn cancel(&self, run_id: RunId) {
        self.runs.request_cancel(run_id);
        if let Some(run_state) = self.active.get(&run_id) {
            run_state.write().request_cancel();
        }
    }

    /// Executes §4.8's seven steps for one request, returning once the run
    /// reaches a terminal status.
    ///
    /// # Errors
    ///
    /// `IceErrorKind::NotFound` if `BlueprintSource::Registered` names an
    /// unknown blueprint; `IceErrorKind::Validation` if compilation fails;
    /// `IceErrorKind::BudgetExceeded` if the pre-flight estimate exceeds
    /// `org_budget_usd`.
    pub async fn submit(&self, request: RunRequest) -> Result<RunHandle, IceError> {
        // Step 1: look up or use inline blueprint, compile a Plan.
        let blueprint = self.resolve_blueprint(&request.source)?;
        let CompiledPlan { plan, budget } =
            icecore_compiler::compile(&blueprint, &self.registry, self.rates.as_ref(), Utc::now())?;

        // Step 2: budget pre-flight.
        if budget.total_usd > self.config.org_budget_usd {
            return Err(IceError::budget_exceeded(format!(
                "estimated cost {:.4} USD exceeds org budget {:.4} USD",
                budget.total_usd, self.config.org_budget_usd
            )));
        }

        // Step 3: generate run_id, create the Run record in `pending`.
        let run_id = RunId::v4();
        let blueprint_id = matches!(&request.source, BlueprintSource::Registered(_))
            .then_some(blueprint.id);
        let fingerprint = plan_fingerprint(blueprint.id, blueprint.version);
        self.runs.insert(RunRecord::pending(run_id, blueprint_id, fingerprint));

        // Step 4: open the Event Bus stream before anything can emit into it.
        let subscription = self.events.subscribe(run_id, None);

        // Step 5: instantiate Context seeded with inputs.
        let max_concurrent_nodes = request
            .options
            .max_parallel
            .unwrap_or(self.config.max_parallel_default);
        let node_ids: Vec<_> = blueprint.nodes.iter().map(|n| n.id).collect();
        let run_state = Arc::new(RwLock::new(RunState::new(run_id, blueprint.id, &node_ids)));
        let ctx = Arc::new(
            RunContext::new(
                run_id,
                Arc::new(blueprint.clone()),
                ExecutionBudget {
                    max_concurrent_nodes,
                    ..ExecutionBudget::default()
                },
            )
            .with_variables(request.inputs),
        );

        self.runs.update(run_id, |record| {
            record.cost_so_far = budget.total_usd;
        });
        self.active.insert(run_id, Arc::clone(&run_state));

        // Step 6: hand Plan + Context to the Scheduler and await completion.
        // The Scheduler itself transitions the run to `Running`, emits
        // `run.started`/`run.finished`, and transitions to the terminal
        // status — see `icecore_scheduler::Scheduler::run`.
        let scheduler = Arc::clone(&self.scheduler);
        let runs = Arc::clone(&self.runs);
        let active = Arc::clone(&self.active);
        let blueprint_for_task = blueprint;
        let plan_for_task = plan;
        let run_state_for_task = Arc::clone(&run_state);
        let ctx_for_task = Arc::clone(&ctx);

        tokio::spawn(async move {
            let outcome = scheduler
                .run(&plan_for_task, &blueprint_for_task, ctx_for_task, run_state_for_task.clone())
                .await;
            finalize(&runs, run_id, run_state_for_task, outcome);
            active.remove(&run_id);
        });

        // Step 7 (retention) is handled by the Event Bus's own replay buffer
        // and `RunTable::sweep_expired`, driven by `event_retention_seconds`.
        Ok(RunHandle { run_id, events: subscription })
    }

    fn resolve_blueprint(&self, source: &BlueprintSource) -> Result<Blueprint, IceError> {
        match source {
            BlueprintSource::Registered(id) => {
                let (blueprint, _version) = self.store.get(*id)?;
                Ok(blueprint)
            }
            BlueprintSource::Inline(blueprint) => Ok(blueprint.clone()),
        }
    }

    /// Runs §4.3's checks and the §4.3 check 6 budget estimate against
    /// `blueprint` without creating a Run or touching the Scheduler — the
    /// read-only half of [`Self::submit`]'s step 1/2, exposed for
    /// `icecore-cli`'s `validate` subcommand.
    ///
    /// # Errors
    ///
    /// `IceErrorKind::Validation` carrying every offense found (§4.3 collects
    /// all of them before failing, not just the first).
    pub fn validate(&self, blueprint: &Blueprint) -> Result<BudgetEstimate, IceError> {
        let CompiledPlan { budget, .. } =
            icecore_compiler::compile(blueprint, &self.registry, self.rates.as_ref(), Utc::now())?;
        Ok(budget)
    }

    /// Sweeps terminal runs older than `event_retention_seconds` out of the
    /// run table. A caller (`icecore-cli`'s daemon mode, a test) drives this
    /// periodically; the controller never schedules its own timer, keeping
    /// it free of background tasks a unit test would have to tear down.
    pub fn sweep_expired_runs(&self) {
        self.runs.sweep_expired(
            Duration::from_secs(self.config.event_retention_seconds),
            Utc::now(),
        );
    }
}

fn finalize(
    runs: &RunTable,
    run_id: RunId,
    run_state: Arc<RwLock<RunState>>,
    outcome: Result<RunStatus, IceError>,
) {
    let now = Utc::now();
    match outcome {
        Ok(status) => {
            runs.update(run_id, |record| {
                record.status = status;
                record.started_at = run_state.read().started_at;
                record.finished_at = Some(now);
                record.result = Some(serde_json::json!({ "status": status }));
            });
        }
        Err(err) => {
            runs.update(run_id, |record| {
                record.status = RunStatus::Failed;
                record.finished_at = Some(now);
                record.error = Some(err.to_wire());
            });
        }
    }
}

/// Builds the default expression evaluator wired into a freshly-built
/// [`Scheduler`] — exposed so `icecore-cli` and tests can build a
/// [`RunController`] without re-deriving this wiring.
#[must_use]
pub fn default_scheduler(
    executors: Arc<icecore_executors::ExecutorRegistry>,
    events: Arc<EventBus>,
    evaluator: Arc<dyn ExpressionEvaluator>,
) -> Scheduler {
    Scheduler::new(executors, events).with_expression_evaluator(evaluator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::{build_registry, Drivers};
    use icecore_compiler::FallbackRateTable;
    use icecore_expression::MiniLanguageEvaluator;
    use icecore_workflow::{BlueprintMetadata, NodeKind, NodeSpec};
    use std::time::Duration as StdDuration;

    fn meta() -> BlueprintMetadata {
        BlueprintMetadata {
            name: "t".into(),
            owner: None,
            created_at: Utc::now(),
            description: None,
        }
    }

    fn single_condition_blueprint() -> Blueprint {
        let node = NodeSpec::new(
            icecore_core::NodeId::v4(),
            NodeKind::Condition { expression: "true".into() },
        );
        Blueprint::new(BlueprintId::v4(), 1, 0, meta(), vec![node]).unwrap()
    }

    fn test_controller() -> RunController {
        let evaluator: Arc<dyn ExpressionEvaluator> = Arc::new(MiniLanguageEvaluator::new());
        let executors = Arc::new(build_registry(Arc::clone(&evaluator), &Drivers::default()));
        let events = Arc::new(EventBus::new(16, StdDuration::from_secs(60)));
        let scheduler = Arc::new(default_scheduler(executors, Arc::clone(&events), evaluator));
        RunController::new(
            Arc::new(Registry::new()),
            Arc::new(BlueprintStore::new()),
            events,
            scheduler,
            Arc::new(FallbackRateTable::default()),
            RuntimeConfig::default(),
        )
    }

    #[tokio::test]
    async fn submit_inline_blueprint_runs_to_completion() {
        let controller = test_controller();
        let request = RunRequest {
            source: BlueprintSource::Inline(single_condition_blueprint()),
            inputs: serde_json::Map::new(),
            options: RunOptions::default(),
        };

        let mut handle = controller.submit(request).await.unwrap();
        loop {
            let record = controller.status(handle.run_id).unwrap();
            if record.status.is_terminal() {
                assert_eq!(record.status, RunStatus::Succeeded);
                break;
            }
            handle.events.live.recv().await;
        }
    }

    #[tokio::test]
    async fn submit_unregistered_blueprint_id_is_not_found() {
        let controller = test_controller();
        let request = RunRequest {
            source: BlueprintSource::Registered(BlueprintId::v4()),
            inputs: serde_json::Map::new(),
            options: RunOptions::default(),
        };
        let err = controller.submit(request).await.unwrap_err();
        assert_eq!(err.kind, icecore_execution::IceErrorKind::NotFound);
    }

    #[tokio::test]
    async fn submit_over_budget_blueprint_is_rejected() {
        let evaluator: Arc<dyn ExpressionEvaluator> = Arc::new(MiniLanguageEvaluator::new());
        let executors = Arc::new(build_registry(Arc::clone(&evaluator), &Drivers::default()));
        let events = Arc::new(EventBus::new(16, StdDuration::from_secs(60)));
        let scheduler = Arc::new(default_scheduler(executors, Arc::clone(&events), evaluator));
        let controller = RunController::new(
            Arc::new(Registry::new()),
            Arc::new(BlueprintStore::new()),
            events,
            scheduler,
            Arc::new(FallbackRateTable::default()),
            RuntimeConfig { org_budget_usd: 0.0001, ..RuntimeConfig::default() },
        );

        let node = NodeSpec::new(
            icecore_core::NodeId::v4(),
            NodeKind::Llm {
                provider: "acme".into(),
                model: "big".into(),
                system_prompt: None,
                prompt: "hi".into(),
                temperature: None,
                max_tokens: Some(1_000_000),
                response_schema: None,
            },
        );
        let blueprint = Blueprint::new(BlueprintId::v4(), 1, 0, meta(), vec![node]).unwrap();

        let request = RunRequest {
            source: BlueprintSource::Inline(blueprint),
            inputs: serde_json::Map::new(),
            options: RunOptions::default(),
        };
        let err = controller.submit(request).await.unwrap_err();
        assert_eq!(err.kind, icecore_execution::IceErrorKind::BudgetExceeded);
    }

    #[tokio::test]
    async fn cancel_sets_flag_on_run_record() {
        let controller = test_controller();
        let request = RunRequest {
            source: BlueprintSource::Inline(single_condition_blueprint()),
            inputs: serde_json::Map::new(),
            options: RunOptions::default(),
        };
        let handle = controller.submit(request).await.unwrap();
        controller.cancel(handle.run_id);
        assert!(controller.status(handle.run_id).unwrap().cancel_requested);
    }
}
