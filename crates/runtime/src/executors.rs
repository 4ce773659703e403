//! Wires the node-kind executors into one [`ExecutorRegistry`] — the seam
//! `icecore-executors`' crate doc calls out explicitly: "concrete providers
//! are out of scope [t]here; the runtime wires real implementations in at
//! startup." `condition` gets the restricted-expression-language evaluator
//! unconditionally (it has no external dependency). `loop`/`parallel`/
//! `recursive` are never registered here — `icecore-scheduler` dispatches
//! them directly since they need to invoke *other* nodes, which no
//! single-shot [`icecore_executors::NodeExecutor`] can do. The remaining
//! four kinds (`tool`, `llm`, `agent`, `code`, `workflow`) only register if a
//! caller supplies a driver for the port they need — a process that never
//! wires a [`ToolInvoker`] simply can't run blueprints containing `tool`
//! nodes, which is the correct failure mode (`RegistryBindingMissing` at
//! compile time, not a runtime panic).

use std::sync::Arc;

use icecore_executors::{
    AgentExecutor, CodeExecutor, CodeRunner, ConditionExecutor, ExecutorRegistry,
    ExpressionEvaluator, LlmExecutor, LlmProvider, SubBlueprintRunner, ToolExecutor, ToolInvoker,
    WorkflowExecutor,
};

/// Optional concrete backends for the kinds that dispatch to an external
/// capability rather than built-in control flow. Each is `None` by default —
/// a caller opts in by constructing one and assigning it before calling
/// [`build_registry`].
#[derive(Default, Clone)]
pub struct Drivers {
    pub tool_invoker: Option<Arc<dyn ToolInvoker>>,
    pub llm_provider: Option<Arc<dyn LlmProvider>>,
    pub code_runner: Option<Arc<dyn CodeRunner>>,
    pub sub_blueprint_runner: Option<Arc<dyn SubBlueprintRunner>>,
}

/// Builds the [`ExecutorRegistry`] the Scheduler dispatches every non-control-flow
/// node through, registering `condition` unconditionally and driver-backed
/// executors only for the drivers `drivers` supplies.
#[must_use]
pub fn build_registry(
    evaluator: Arc<dyn ExpressionEvaluator>,
    drivers: &Drivers,
) -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();

    registry.register(Arc::new(ConditionExecutor::new(Arc::clone(&evaluator))));

    if let Some(invoker) = &drivers.tool_invoker {
        registry.register(Arc::new(ToolExecutor::new(Arc::clone(invoker))));
    }
    if let Some(provider) = &drivers.llm_provider {
        registry.register(Arc::new(LlmExecutor::new(Arc::clone(provider))));
        if let Some(invoker) = &drivers.tool_invoker {
            registry.register(Arc::new(AgentExecutor::new(
                Arc::clone(provider),
                Arc::clone(invoker),
            )));
        }
    }
    if let Some(runner) = &drivers.code_runner {
        registry.register(Arc::new(CodeExecutor::new(Arc::clone(runner))));
    }
    if let Some(runner) = &drivers.sub_blueprint_runner {
        registry.register(Arc::new(WorkflowExecutor::new(Arc::clone(runner))));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use icecore_expression::MiniLanguageEvaluator;

    #[test]
    fn condition_executor_always_present_loop_parallel_recursive_never_registered() {
        let evaluator: Arc<dyn ExpressionEvaluator> = Arc::new(MiniLanguageEvaluator::new());
        let registry = build_registry(evaluator, &Drivers::default());
        assert!(registry.contains("condition"));
        assert!(!registry.contains("loop"));
        assert!(!registry.contains("parallel"));
        assert!(!registry.contains("recursive"));
        assert!(!registry.contains("tool"));
        assert!(!registry.contains("llm"));
        assert!(!registry.contains("agent"));
        assert!(!registry.contains("code"));
        assert!(!registry.contains("workflow"));
    }
}
