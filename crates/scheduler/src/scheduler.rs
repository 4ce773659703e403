//! The level-parallel DAG execution loop.
//!
//! Grounded on `nebula-engine::engine::WorkflowEngine` —
//! `run_levels` dispatching one `Plan` level at a time, `spawn_level`
//! bounding concurrency with a semaphore, `collect_level_results` draining
//! the join set, and `determine_final_status`/`emit_final_event` closing out
//! the run. Failures don't stop the whole run outright: each node's
//! dependencies are checked individually (`continue_on_error`), so
//! independent branches downstream of an unrelated failure keep running.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use icecore_core::{BlueprintId, NodeId, RunId};
use icecore_eventbus::{EventBus, EventKind};
use icecore_execution::{IceError, NodeAttempt};
use icecore_execution::context::RunContext;
use icecore_execution::state::RunState;
use icecore_execution::status::RunStatus;
use icecore_executors::budget::LargeDataStrategy;
use icecore_executors::context::NodeExecutionContext;
use icecore_executors::registry::ExecutorRegistry;
use icecore_executors::{ExecutorError, ExpressionEvaluator, NodeOutputData};
use icecore_workflow::{Blueprint, DependencyGraph, NodeKind, NodeSpec, NodeState, Plan, WhenClause};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::input::{resolve_binding, resolve_node_input};
use crate::output::{byte_len, interpret, StepOutcome};
use crate::retry::backoff_for;

/// Runs a compiled [`Plan`] level by level, dispatching each node to its
/// registered executor and driving retries, `when` guards, timeouts, and
/// event emission.
pub struct Scheduler {
    executors: Arc<ExecutorRegistry>,
    events: Arc<EventBus>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl Scheduler {
    /// Build a scheduler with no `when`-clause evaluator wired in — nodes
    /// carrying a `when` guard always run. Callers that need guards honored
    /// should use [`Self::with_expression_evaluator`].
    #[must_use]
    pub fn new(executors: Arc<ExecutorRegistry>, events: Arc<EventBus>) -> Self {
        Self {
            executors,
            events,
            evaluator: None,
        }
    }

    /// Wires in the expression evaluator used to resolve `when` guards —
    /// the same [`ExpressionEvaluator`] port `ConditionExecutor` consumes.
    #[must_use]
    pub fn with_expression_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Executes every level of `plan` against `blueprint`, mutating
    /// `run_state` as nodes progress. `run_state` must already contain a
    /// node-execution-state entry for every node in `blueprint` (i.e. it
    /// was built with [`RunState::new`] over the same node ids).
    pub async fn run(
        &self,
        plan: &Plan,
        blueprint: &Blueprint,
        ctx: Arc<RunContext>,
        run_state: Arc<RwLock<RunState>>,
    ) -> Result<RunStatus, IceError> {
        run_state.write().transition_status(RunStatus::Running)?;
        self.events.emit(ctx.run_id, EventKind::RunStarted);

        'levels: for level in &plan.levels {
            if ctx.cancellation.is_cancelled() || run_state.read().cancel_requested {
                break 'levels;
            }

            if wall_time_exceeded(&ctx, &run_state) {
                tracing::warn!(run_id = %ctx.run_id, "run exceeded its max_wall_time budget");
                fail_remaining(blueprint, &run_state, "run exceeded its max_wall_time budget");
                break 'levels;
            }

            let permits = ctx.budget.max_concurrent_nodes.max(1);
            let semaphore = Arc::new(Semaphore::new(permits));
            let mut set: JoinSet<()> = JoinSet::new();

            for &node_id in level {
                let Some(node) = blueprint.node(node_id) else {
                    continue;
                };

                if let Some(reason) = blocking_reason(node, blueprint, &run_state) {
                    mark_skipped(&run_state, node_id, &reason);
                    continue;
                }

                if let Some(when) = node.when.clone() {
                    if !self.passes_when(&when, &ctx).await {
                        mark_skipped(&run_state, node_id, "when clause evaluated false");
                        continue;
                    }
                }

                let node = node.clone();
                let executors = Arc::clone(&self.executors);
                let events = Arc::clone(&self.events);
                let ctx = Arc::clone(&ctx);
                let run_state = Arc::clone(&run_state);
                let semaphore = Arc::clone(&semaphore);
                let evaluator = self.evaluator.clone();

                set.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("semaphore is never closed while the scheduler runs");
                    run_node(&executors, &events, &ctx, &run_state, node, evaluator.as_ref()).await;
                });
            }

            while set.join_next().await.is_some() {}
        }

        if ctx.cancellation.is_cancelled() || run_state.read().cancel_requested {
            cancel_remaining(blueprint, &run_state);
        }

        let final_status = determine_final_status(blueprint, &ctx, &run_state);
        run_state.write().transition_status(final_status)?;
        self.events.emit(
            ctx.run_id,
            EventKind::RunFinished {
                status: final_status,
            },
        );
        Ok(final_status)
    }

    async fn passes_when(&self, when: &WhenClause, ctx: &RunContext) -> bool {
        evaluate_when(when, ctx, self.evaluator.as_ref()).await
    }
}

/// Evaluates a `when` guard against the run's variables overlaid with every
/// named node's recorded output — `gate.branch == "true"` resolves `gate` to
/// whichever node in the blueprint was given that name via
/// [`icecore_workflow::NodeSpec::with_name`]. With no evaluator wired in, a
/// guard always passes.
async fn evaluate_when(
    when: &WhenClause,
    ctx: &RunContext,
    evaluator: Option<&Arc<dyn ExpressionEvaluator>>,
) -> bool {
    let Some(evaluator) = evaluator else {
        return true;
    };
    let scope = when_scope(ctx);
    match evaluator.evaluate(&when.expression, &scope).await {
        Ok(value) => is_truthy(&value),
        Err(err) => {
            tracing::warn!(error = %err, "when clause evaluation failed, treating as not satisfied");
            false
        }
    }
}

/// The JSON object a `when`/`convergence_expression` is evaluated against:
/// the run's variables, plus one entry per named node holding that node's
/// recorded output.
fn when_scope(ctx: &RunContext) -> serde_json::Value {
    let mut scope = ctx.variables.read().clone();
    for node in &ctx.blueprint.nodes {
        let Some(name) = &node.name else { continue };
        let Some(output) = ctx.get_node_output(node.id) else { continue };
        let Some(value) = output.as_value() else { continue };
        scope.insert(name.clone(), value.clone());
    }
    serde_json::Value::Object(scope)
}

/// Runs one node to a terminal state, retrying per its `retry_policy` and
/// honoring `timeout_ms`. Mutates `run_state`/`ctx` directly rather than
/// returning a value — the caller only needs to know when the task drains.
///
/// `loop`/`parallel`/`recursive` are intercepted here, before the generic
/// executor-registry dispatch: none of the three can be expressed as a
/// single-shot [`icecore_executors::executor::NodeExecutor`] since each
/// needs to dispatch *other* nodes, so the Scheduler drives them directly
/// via [`run_loop`]/[`run_parallel`]/[`run_recursive`].
async fn run_node(
    executors: &ExecutorRegistry,
    events: &EventBus,
    ctx: &RunContext,
    run_state: &RwLock<RunState>,
    node: NodeSpec,
    evaluator: Option<&Arc<dyn ExpressionEvaluator>>,
) {
    {
        let mut state = run_state.write();
        if let Some(ns) = state.node_states.get_mut(&node.id) {
            let _ = ns.transition_to(NodeState::Ready);
            let _ = ns.transition_to(NodeState::Running);
        }
    }
    events.emit(
        ctx.run_id,
        EventKind::NodeStarted { node_id: node.id },
    );

    match &node.kind {
        NodeKind::Loop { .. } => {
            run_loop(executors, events, ctx, run_state, &node, evaluator).await;
            return;
        }
        NodeKind::Parallel { .. } => {
            run_parallel(executors, events, ctx, run_state, &node, evaluator).await;
            return;
        }
        NodeKind::Recursive { .. } => {
            run_recursive(executors, events, ctx, run_state, &node, evaluator).await;
            return;
        }
        _ => {}
    }

    let Some(executor) = executors.get(node.kind.label()).cloned() else {
        let message = format!("no executor registered for kind `{}`", node.kind.label());
        fail_node(run_state, &node, &message);
        events.emit(
            ctx.run_id,
            EventKind::NodeFailed {
                node_id: node.id,
                error: message,
            },
        );
        return;
    };

    let policy = node.retry_policy_or_default();
    let mut attempt_number: u32 = 0;

    loop {
        if ctx.cancellation.is_cancelled() {
            set_terminal(run_state, node.id, NodeState::Cancelled);
            return;
        }

        let input = match resolve_node_input(&node, ctx) {
            Ok(value) => value,
            Err(err) => {
                let message = err.to_string();
                fail_node(run_state, &node, &message);
                events.emit(
                    ctx.run_id,
                    EventKind::NodeFailed {
                        node_id: node.id,
                        error: message,
                    },
                );
                return;
            }
        };

        let exec_ctx = NodeExecutionContext::new(ctx.run_id, node.id, ctx.blueprint.id)
            .with_cancellation(ctx.cancellation.child_token())
            .with_variables(ctx.variables.read().clone());

        let key = icecore_execution::idempotency::IdempotencyKey::generate(
            ctx.run_id,
            node.id,
            attempt_number,
        );
        let mut attempt = NodeAttempt::new(attempt_number, key);

        let call = executor.execute(&exec_ctx, input);
        let outcome = match node.timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), call).await {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::fatal("node timed out")),
            },
            None => call.await,
        };

        match outcome {
            Ok(result) => match interpret(result) {
                StepOutcome::Continue { value, delay } => {
                    attempt.complete_success(NodeOutputData::inline(value), byte_len(&value));
                    push_attempt(run_state, node.id, attempt);
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    attempt_number += 1;
                    continue;
                }
                StepOutcome::Wait { value, resume_at } => {
                    attempt.complete_success(
                        NodeOutputData::inline(value.clone().unwrap_or(serde_json::Value::Null)),
                        0,
                    );
                    push_attempt(run_state, node.id, attempt);
                    let delay = (resume_at - chrono::Utc::now())
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    tokio::time::sleep(delay).await;
                    continue;
                }
                StepOutcome::Done { state, value, note } => {
                    let bytes = byte_len(&value);

                    if let Some(message) = output_limit_violation(ctx, bytes) {
                        fail_node(run_state, &node, &message);
                        events.emit(
                            ctx.run_id,
                            EventKind::NodeFailed {
                                node_id: node.id,
                                error: message,
                            },
                        );
                        return;
                    }

                    attempt.complete_success(NodeOutputData::inline(value.clone()), bytes);
                    ctx.set_node_output(
                        node.id,
                        icecore_execution::NodeOutput::inline(value, state, bytes),
                    );

                    {
                        let mut run = run_state.write();
                        run.total_output_bytes += bytes;
                        if let Some(ns) = run.node_states.get_mut(&node.id) {
                            ns.attempts.push(attempt);
                            ns.error_message = note;
                            let _ = ns.transition_to(state);
                        }
                    }
                    events.emit(
                        ctx.run_id,
                        EventKind::NodeFinished {
                            node_id: node.id,
                            output_bytes: bytes,
                        },
                    );
                    return;
                }
            },
            Err(err) => {
                attempt.complete_failure(err.to_string());
                push_attempt(run_state, node.id, attempt);

                let under_retry_budget =
                    run_state.read().total_retries < ctx.budget.max_total_retries;
                let retryable =
                    err.is_retryable() && attempt_number + 1 < policy.max_attempts && under_retry_budget;

                if retryable {
                    let delay = backoff_for(policy, attempt_number);
                    {
                        let mut run = run_state.write();
                        run.total_retries += 1;
                        if let Some(ns) = run.node_states.get_mut(&node.id) {
                            let _ = ns.transition_to(NodeState::Failed);
                            let _ = ns.transition_to(NodeState::Retrying);
                        }
                    }
                    events.emit(
                        ctx.run_id,
                        EventKind::NodeRetry {
                            node_id: node.id,
                            attempt_number: attempt_number + 1,
                            backoff_ms: delay.as_millis() as u64,
                        },
                    );
                    tokio::time::sleep(delay).await;
                    {
                        let mut run = run_state.write();
                        if let Some(ns) = run.node_states.get_mut(&node.id) {
                            let _ = ns.transition_to(NodeState::Running);
                        }
                    }
                    attempt_number += 1;
                    continue;
                }

                let ice_err: IceError = err.into();
                let message = ice_err.to_string();
                fail_node(run_state, &node, &message);
                events.emit(
                    ctx.run_id,
                    EventKind::NodeFailed {
                        node_id: node.id,
                        error: message,
                    },
                );
                return;
            }
        }
    }
}

/// Records `value` as a control-flow node's (`loop`/`parallel`/`recursive`)
/// completed output and drives its state straight to `Completed` — these
/// nodes never retry and never run an executor attempt of their own, so
/// they skip the attempt-tracking path ordinary nodes go through.
fn finish_control_flow_node(
    run_state: &RwLock<RunState>,
    events: &EventBus,
    ctx: &RunContext,
    node: &NodeSpec,
    value: serde_json::Value,
) {
    let bytes = byte_len(&value);
    ctx.set_node_output(
        node.id,
        icecore_execution::NodeOutput::inline(value, NodeState::Completed, bytes),
    );
    {
        let mut run = run_state.write();
        run.total_output_bytes += bytes;
        if let Some(ns) = run.node_states.get_mut(&node.id) {
            let _ = ns.transition_to(NodeState::Completed);
        }
    }
    events.emit(
        ctx.run_id,
        EventKind::NodeFinished {
            node_id: node.id,
            output_bytes: bytes,
        },
    );
}

/// Builds a throwaway [`Blueprint`] over exactly `ids`, with each copied
/// node's `dependencies` intersected against `ids` — a body node may depend
/// on something outside the subgraph (e.g. whatever the owning control-flow
/// node itself depends on), which would otherwise trip
/// [`Blueprint::new`]'s dangling-dependency check.
fn sub_blueprint(ctx: &RunContext, ids: &[NodeId]) -> Option<Blueprint> {
    let id_set: HashSet<NodeId> = ids.iter().copied().collect();
    let nodes: Vec<NodeSpec> = ids
        .iter()
        .filter_map(|id| ctx.blueprint.node(*id))
        .cloned()
        .map(|mut n| {
            n.dependencies.retain(|d| id_set.contains(d));
            n
        })
        .collect();
    Blueprint::new(
        BlueprintId::v4(),
        ctx.blueprint.schema_version,
        ctx.blueprint.version,
        ctx.blueprint.metadata.clone(),
        nodes,
    )
    .ok()
}

/// Every node id forward-reachable from `start` by following `dependencies`
/// edges — the set a `recursive` node's `body_entry` roots, mirroring
/// `icecore_workflow::graph`'s own recursive-body closure but computed here
/// since the Scheduler, not the graph module, is what re-enters this set
/// once per iteration.
fn forward_reachable(ctx: &RunContext, start: NodeId) -> Vec<NodeId> {
    let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for node in &ctx.blueprint.nodes {
        for &dep in &node.dependencies {
            dependents.entry(dep).or_default().push(node.id);
        }
    }
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    let mut ordered = Vec::new();
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            ordered.push(id);
            if let Some(next) = dependents.get(&id) {
                stack.extend(next.iter().copied());
            }
        }
    }
    ordered
}

/// Runs a `loop`/`parallel` body or a `recursive` body subgraph to
/// completion against a fresh, throwaway [`RunState`] scoped to just `ids` —
/// isolated from the run-level `RunState` so concurrent iterations reusing
/// the same body node ids never race on it. Returns whether every id in it
/// reached a non-failing terminal state.
async fn run_body(
    executors: &ExecutorRegistry,
    events: &EventBus,
    ctx: &RunContext,
    ids: &[NodeId],
    evaluator: Option<&Arc<dyn ExpressionEvaluator>>,
) -> bool {
    if ids.is_empty() {
        return true;
    }
    let Some(sub) = sub_blueprint(ctx, ids) else {
        return false;
    };
    let Ok(graph) = DependencyGraph::from_blueprint(&sub) else {
        return false;
    };
    let Ok(levels) = graph.compute_levels() else {
        return false;
    };
    let local_state = RwLock::new(RunState::new(ctx.run_id, ctx.blueprint.id, ids));

    for level in &levels {
        for &node_id in level {
            if ctx.cancellation.is_cancelled() {
                return false;
            }
            let Some(node) = sub.node(node_id) else {
                continue;
            };
            if let Some(reason) = blocking_reason(node, &sub, &local_state) {
                mark_skipped(&local_state, node_id, &reason);
                continue;
            }
            if let Some(when) = node.when.clone() {
                if !evaluate_when(&when, ctx, evaluator).await {
                    mark_skipped(&local_state, node_id, "when clause evaluated false");
                    continue;
                }
            }
            run_node(executors, events, ctx, &local_state, node.clone(), evaluator).await;
        }
    }

    ids.iter().all(|id| {
        local_state
            .read()
            .node_state(*id)
            .is_some_and(|ns| matches!(ns.state, NodeState::Completed | NodeState::Skipped))
    })
}

/// The collected output of a body subgraph's exit nodes: `ctx`'s recorded
/// output for each of `ids`'s DAG sinks, flattened to a single value if
/// there is exactly one.
fn exit_values(ctx: &RunContext, ids: &[NodeId]) -> serde_json::Value {
    let Some(sub) = sub_blueprint(ctx, ids) else {
        return serde_json::Value::Null;
    };
    let Ok(graph) = DependencyGraph::from_blueprint(&sub) else {
        return serde_json::Value::Null;
    };
    let mut values: Vec<serde_json::Value> = graph
        .exit_nodes()
        .into_iter()
        .filter_map(|id| ctx.get_node_output(id))
        .filter_map(|out| out.as_value().cloned())
        .collect();
    match values.len() {
        0 => serde_json::Value::Null,
        1 => values.remove(0),
        _ => serde_json::Value::Array(values),
    }
}

/// One loop item's result: its body's collected output on success, or the
/// literal string `"failed"` when the body didn't reach a clean terminal
/// state — deliberately a plain marker rather than an error object, so a
/// `loop` with `continue_on_error` set produces the flat
/// `[success, "failed", success]`-shaped array callers can match on
/// directly.
fn body_result_value(ctx: &RunContext, ids: &[NodeId], ok: bool) -> serde_json::Value {
    if ok {
        exit_values(ctx, ids)
    } else {
        serde_json::json!("failed")
    }
}

/// Iterates `items_source` over `loop_variable`, dispatching `body` once
/// per item — concurrently in batches of `parallel_items` (default: one at
/// a time) — and collecting each item's result into the node's output
/// array. `continue_on_error` controls whether one item's failure fails the
/// whole node or simply appears as `"failed"` in the output array.
async fn run_loop(
    executors: &ExecutorRegistry,
    events: &EventBus,
    ctx: &RunContext,
    run_state: &RwLock<RunState>,
    node: &NodeSpec,
    evaluator: Option<&Arc<dyn ExpressionEvaluator>>,
) {
    let NodeKind::Loop {
        items_source,
        loop_variable,
        body,
        max_iterations,
        parallel_items,
    } = &node.kind
    else {
        unreachable!("run_loop is only called for Loop nodes");
    };

    let items = match resolve_binding(items_source, ctx) {
        Ok(value) => value,
        Err(err) => {
            let message = err.to_string();
            fail_node(run_state, node, &message);
            events.emit(ctx.run_id, EventKind::NodeFailed { node_id: node.id, error: message });
            return;
        }
    };
    let Some(items) = items.as_array() else {
        let message = "loop node's items_source did not resolve to a JSON array".to_string();
        fail_node(run_state, node, &message);
        events.emit(ctx.run_id, EventKind::NodeFailed { node_id: node.id, error: message });
        return;
    };

    let limit = max_iterations
        .map(|m| (m as usize).min(items.len()))
        .unwrap_or(items.len());
    let batch_size = parallel_items.unwrap_or(1).max(1);
    let mut results = Vec::with_capacity(limit);

    for chunk in items[..limit].chunks(batch_size) {
        if ctx.cancellation.is_cancelled() {
            set_terminal(run_state, node.id, NodeState::Cancelled);
            return;
        }

        let runs = chunk.iter().map(|item| {
            let item_ctx = ctx.fork_with_variable(loop_variable.clone(), item.clone());
            async move {
                let ok = run_body(executors, events, &item_ctx, body, evaluator).await;
                body_result_value(&item_ctx, body, ok)
            }
        });
        let chunk_results = futures::future::join_all(runs).await;
        let chunk_failed = chunk_results
            .iter()
            .any(|value| value == &serde_json::json!("failed"));
        results.extend(chunk_results);

        if chunk_failed && !node.continue_on_error {
            let message = "loop item failed and continue_on_error is false".to_string();
            fail_node(run_state, node, &message);
            events.emit(ctx.run_id, EventKind::NodeFailed { node_id: node.id, error: message });
            return;
        }
    }

    finish_control_flow_node(run_state, events, ctx, node, serde_json::Value::Array(results));
}

/// Dispatches every `branches` list concurrently. `allow_partial` controls
/// whether a branch's failure fails the whole node or is simply counted in
/// the `failed` tally of the `{succeeded, failed}` result.
async fn run_parallel(
    executors: &ExecutorRegistry,
    events: &EventBus,
    ctx: &RunContext,
    run_state: &RwLock<RunState>,
    node: &NodeSpec,
    evaluator: Option<&Arc<dyn ExpressionEvaluator>>,
) {
    let NodeKind::Parallel { branches, allow_partial } = &node.kind else {
        unreachable!("run_parallel is only called for Parallel nodes");
    };

    if ctx.cancellation.is_cancelled() {
        set_terminal(run_state, node.id, NodeState::Cancelled);
        return;
    }

    let runs = branches.iter().map(|branch_ids| {
        let branch_ctx = ctx.fork();
        async move {
            let ok = run_body(executors, events, &branch_ctx, branch_ids, evaluator).await;
            (ok, body_result_value(&branch_ctx, branch_ids, ok))
        }
    });
    let branch_results = futures::future::join_all(runs).await;

    let succeeded: Vec<serde_json::Value> = branch_results
        .iter()
        .filter(|(ok, _)| *ok)
        .map(|(_, value)| value.clone())
        .collect();
    let failed_count = branch_results.iter().filter(|(ok, _)| !*ok).count();

    if failed_count > 0 && !allow_partial {
        let message = format!(
            "{failed_count} of {} parallel branches failed and allow_partial is false",
            branches.len()
        );
        fail_node(run_state, node, &message);
        events.emit(ctx.run_id, EventKind::NodeFailed { node_id: node.id, error: message });
        return;
    }

    let output = serde_json::json!({
        "succeeded": succeeded,
        "failed": failed_count,
    });
    finish_control_flow_node(run_state, events, ctx, node, output);
}

/// Re-enters the `body_entry`-rooted subgraph once per iteration, checking
/// `convergence_expression` against the accumulated output after each pass
/// and emitting `recursive.iteration` as it goes. Stops on convergence, or
/// on `max_iterations` — failing the node unless `best_effort` is set, in
/// which case the last accumulated output is returned with `converged:
/// false`. `preserve_context_key`, when set, carries the previous
/// iteration's output into the next one as a run variable under that key,
/// so the body's own nodes can reference it.
async fn run_recursive(
    executors: &ExecutorRegistry,
    events: &EventBus,
    ctx: &RunContext,
    run_state: &RwLock<RunState>,
    node: &NodeSpec,
    evaluator: Option<&Arc<dyn ExpressionEvaluator>>,
) {
    let NodeKind::Recursive {
        body_entry,
        convergence_expression,
        max_iterations,
        preserve_context_key,
        best_effort,
    } = &node.kind
    else {
        unreachable!("run_recursive is only called for Recursive nodes");
    };

    let body_ids = forward_reachable(ctx, *body_entry);
    let mut accumulated = serde_json::Value::Null;

    for iteration in 0..*max_iterations {
        if ctx.cancellation.is_cancelled() {
            set_terminal(run_state, node.id, NodeState::Cancelled);
            return;
        }

        let iter_ctx = ctx.fork();
        if let Some(key) = preserve_context_key {
            iter_ctx.set_variable(key.clone(), accumulated.clone());
        }

        let ok = run_body(executors, events, &iter_ctx, &body_ids, evaluator).await;
        events.emit(
            ctx.run_id,
            EventKind::RecursiveIteration {
                node_id: node.id,
                iteration: iteration + 1,
            },
        );

        if !ok {
            let message = format!("recursive node's body failed on iteration {}", iteration + 1);
            fail_node(run_state, node, &message);
            events.emit(ctx.run_id, EventKind::NodeFailed { node_id: node.id, error: message });
            return;
        }

        accumulated = exit_values(&iter_ctx, &body_ids);

        let converged = match evaluator {
            Some(evaluator) => match evaluator.evaluate(convergence_expression, &accumulated).await {
                Ok(value) => is_truthy(&value),
                Err(err) => {
                    let message = format!("convergence expression failed: {err}");
                    fail_node(run_state, node, &message);
                    events.emit(ctx.run_id, EventKind::NodeFailed { node_id: node.id, error: message });
                    return;
                }
            },
            None => false,
        };

        if converged {
            finish_control_flow_node(
                run_state,
                events,
                ctx,
                node,
                serde_json::json!({
                    "converged": true,
                    "iterations": iteration + 1,
                    "output": accumulated,
                }),
            );
            return;
        }
    }

    if *best_effort {
        finish_control_flow_node(
            run_state,
            events,
            ctx,
            node,
            serde_json::json!({
                "converged": false,
                "iterations": *max_iterations,
                "output": accumulated,
            }),
        );
    } else {
        let message = format!("recursive node did not converge within {max_iterations} iterations");
        fail_node(run_state, node, &message);
        events.emit(ctx.run_id, EventKind::NodeFailed { node_id: node.id, error: message });
    }
}

fn push_attempt(run_state: &RwLock<RunState>, node_id: NodeId, attempt: NodeAttempt) {
    if let Some(ns) = run_state.write().node_states.get_mut(&node_id) {
        ns.attempts.push(attempt);
    }
}

fn set_terminal(run_state: &RwLock<RunState>, node_id: NodeId, state: NodeState) {
    if let Some(ns) = run_state.write().node_states.get_mut(&node_id) {
        let _ = ns.transition_to(state);
    }
}

fn fail_node(run_state: &RwLock<RunState>, node: &NodeSpec, message: &str) {
    let mut run = run_state.write();
    if let Some(ns) = run.node_states.get_mut(&node.id) {
        if ns.state == NodeState::Ready {
            let _ = ns.transition_to(NodeState::Running);
        }
        ns.error_message = Some(message.to_string());
        let _ = ns.transition_to(NodeState::Failed);
    }
}

/// If a node's dependency did not resolve cleanly, returns why this node
/// should be skipped rather than dispatched.
fn blocking_reason(node: &NodeSpec, blueprint: &Blueprint, run_state: &RwLock<RunState>) -> Option<String> {
    let run = run_state.read();
    for &dep_id in &node.dependencies {
        let Some(dep_state) = run.node_state(dep_id) else {
            continue;
        };
        let blocks = match dep_state.state {
            NodeState::Completed => false,
            NodeState::Skipped | NodeState::Cancelled => true,
            NodeState::Failed => !blueprint
                .node(dep_id)
                .is_some_and(|dep| dep.continue_on_error),
            _ => false,
        };
        if blocks {
            return Some(format!("upstream dependency {dep_id} did not complete"));
        }
    }
    None
}

fn mark_skipped(run_state: &RwLock<RunState>, node_id: NodeId, reason: &str) {
    let mut run = run_state.write();
    if let Some(ns) = run.node_states.get_mut(&node_id) {
        ns.error_message = Some(reason.to_string());
        let _ = ns.transition_to(NodeState::Skipped);
    }
}

fn cancel_remaining(blueprint: &Blueprint, run_state: &RwLock<RunState>) {
    let mut run = run_state.write();
    for node in &blueprint.nodes {
        if let Some(ns) = run.node_states.get_mut(&node.id) {
            if !ns.state.is_terminal() {
                let _ = ns.transition_to(NodeState::Cancelled);
            }
        }
    }
}

fn fail_remaining(blueprint: &Blueprint, run_state: &RwLock<RunState>, message: &str) {
    let mut run = run_state.write();
    for node in &blueprint.nodes {
        if let Some(ns) = run.node_states.get_mut(&node.id) {
            if !ns.state.is_terminal() {
                if ns.state == NodeState::Pending {
                    let _ = ns.transition_to(NodeState::Ready);
                }
                if ns.state == NodeState::Ready {
                    let _ = ns.transition_to(NodeState::Running);
                }
                ns.error_message = Some(message.to_string());
                let _ = ns.transition_to(NodeState::Failed);
            }
        }
    }
}

fn wall_time_exceeded(ctx: &RunContext, run_state: &RwLock<RunState>) -> bool {
    let Some(started_at) = run_state.read().started_at else {
        return false;
    };
    let elapsed = (chrono::Utc::now() - started_at).to_std().unwrap_or(Duration::ZERO);
    elapsed > ctx.budget.max_wall_time
}

fn output_limit_violation(ctx: &RunContext, bytes: u64) -> Option<String> {
    let policy = &ctx.budget.data_policy;
    if bytes > policy.max_node_output_bytes && policy.large_data_strategy == LargeDataStrategy::Reject {
        return Some(format!(
            "node output of {bytes} bytes exceeds the {} byte limit",
            policy.max_node_output_bytes
        ));
    }
    if ctx.total_output_bytes() + bytes > ctx.budget.max_payload_bytes {
        return Some(format!(
            "run's total output would exceed its {} byte budget",
            ctx.budget.max_payload_bytes
        ));
    }
    None
}

fn determine_final_status(blueprint: &Blueprint, ctx: &RunContext, run_state: &RwLock<RunState>) -> RunStatus {
    if ctx.cancellation.is_cancelled() || run_state.read().cancel_requested {
        return RunStatus::Canceled;
    }

    let run = run_state.read();
    let blocking_failure = blueprint.nodes.iter().any(|node| {
        run.node_state(node.id)
            .is_some_and(|ns| ns.state == NodeState::Failed && !node.continue_on_error)
    });

    if blocking_failure {
        RunStatus::Failed
    } else {
        RunStatus::Succeeded
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_none_or(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
    }
}
