//! Orchestrates the §4.3 checks into a single `compile` entry point:
//! Blueprint in, `Plan` (plus a budget estimate) or every validation offense
//! out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use icecore_registry::Registry;
use icecore_workflow::{Blueprint, DependencyGraph, NodeKind, Plan};

use crate::budget::{estimate, BudgetEstimate, ModelRateTable};
use crate::checks;
use crate::error::{CompileError, OffenseCode, ValidationOffense};

/// The product of a successful `compile`: the layered `Plan` the Scheduler
/// consumes, plus the pre-flight cost estimate from check 6.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    pub plan: Plan,
    pub budget: BudgetEstimate,
}

/// Validates `blueprint` against every check in §4.3 and, if none fail,
/// compiles it into a `Plan`. Collects every offense across every node
/// before returning `Err` — a caller never has to recompile to see the next
/// problem.
pub fn compile(
    blueprint: &Blueprint,
    registry: &Registry,
    rates: &dyn ModelRateTable,
    created_at: DateTime<Utc>,
) -> Result<CompiledPlan, CompileError> {
    let mut offenses = checks::run(blueprint, registry);

    let graph = match DependencyGraph::from_blueprint(blueprint) {
        Ok(graph) => Some(graph),
        Err(icecore_workflow::GraphError::Cycle) => {
            offenses.push(ValidationOffense::on_blueprint(
                OffenseCode::Cycle,
                "blueprint dependency graph contains a cycle",
            ));
            None
        }
        Err(icecore_workflow::GraphError::UnknownBodyEntry(node_id)) => {
            offenses.push(ValidationOffense::on_node(
                node_id,
                OffenseCode::UnknownBodyEntry,
                format!("recursive node {node_id} references a body_entry id not present in the blueprint"),
            ));
            None
        }
    };

    let Some(graph) = graph else {
        return Err(CompileError::Validation(offenses));
    };

    if !offenses.is_empty() {
        return Err(CompileError::Validation(offenses));
    }

    let registry_bindings = resolve_bindings(blueprint, registry);
    let levels = graph.compute_levels().expect("acyclicity already checked above");
    let plan = Plan {
        blueprint_id: blueprint.id,
        blueprint_version: blueprint.version,
        levels,
        entry_nodes: graph.entry_nodes(),
        exit_nodes: graph.exit_nodes(),
        total_nodes: graph.scheduled_node_count(),
        registry_bindings,
        created_at,
    };
    let budget = estimate(blueprint, rates);
    Ok(CompiledPlan { plan, budget })
}

/// Every `tool`/`workflow`/`code` node binds to exactly one Registry entry;
/// an `agent` node's tools already resolved individually in `checks::run`
/// and have no single binding of their own to record here.
fn resolve_bindings(
    blueprint: &Blueprint,
    registry: &Registry,
) -> HashMap<icecore_core::NodeId, icecore_core::RegistryEntryId> {
    let mut bindings = HashMap::new();
    for node in &blueprint.nodes {
        let resolved = match &node.kind {
            NodeKind::Tool { tool_name, .. } => registry.get(icecore_registry::RegistryKind::Tool, tool_name).ok(),
            NodeKind::Workflow { workflow_ref, .. } => {
                registry.get(icecore_registry::RegistryKind::Workflow, workflow_ref).ok()
            }
            NodeKind::Code { language, .. } => registry.get(icecore_registry::RegistryKind::Code, language).ok(),
            _ => None,
        };
        if let Some(entry) = resolved {
            bindings.insert(node.id, entry.id);
        }
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::FallbackRateTable;
    use icecore_core::{BlueprintId, NodeId};
    use icecore_registry::RegistryKind;
    use icecore_workflow::{BlueprintMetadata, NodeSpec};
    use pretty_assertions::assert_eq;

    fn meta() -> BlueprintMetadata {
        BlueprintMetadata {
            name: "c".into(),
            owner: None,
            created_at: Utc::now(),
            description: None,
        }
    }

    fn tool(id: NodeId, name: &str) -> NodeSpec {
        NodeSpec::new(
            id,
            NodeKind::Tool {
                tool_name: name.into(),
                tool_args: serde_json::json!({}),
            },
        )
    }

    #[test]
    fn valid_blueprint_compiles_to_a_plan() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            0,
            meta(),
            vec![tool(a, "noop"), tool(b, "noop").with_dependencies([a])],
        )
        .unwrap();
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "noop", serde_json::json!({}), None).unwrap();
        let compiled = compile(&bp, &registry, &FallbackRateTable::default(), Utc::now()).unwrap();
        assert_eq!(compiled.plan.level_count(), 2);
        assert_eq!(compiled.plan.registry_bindings.len(), 2);
    }

    #[test]
    fn unresolved_tool_fails_with_one_offense() {
        let a = NodeId::v4();
        let bp = Blueprint::new(BlueprintId::v4(), 1, 0, meta(), vec![tool(a, "missing")]).unwrap();
        let registry = Registry::new();
        let err = compile(&bp, &registry, &FallbackRateTable::default(), Utc::now()).unwrap_err();
        assert_eq!(err.offenses().len(), 1);
        assert_eq!(err.offenses()[0].code, OffenseCode::UnresolvedRegistryBinding);
    }

    #[test]
    fn cycle_and_missing_field_both_reported_together() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let mut node_a = tool(a, "");
        node_a.dependencies.insert(b);
        let node_b = tool(b, "noop").with_dependencies([a]);
        let bp = Blueprint::new(BlueprintId::v4(), 1, 0, meta(), vec![node_a, node_b]).unwrap();
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "noop", serde_json::json!({}), None).unwrap();
        let err = compile(&bp, &registry, &FallbackRateTable::default(), Utc::now()).unwrap_err();
        // cycle short-circuits layering, but the per-node checks already ran
        // over both nodes before the graph was even built.
        assert!(err.offenses().iter().any(|o| o.code == OffenseCode::Cycle));
        assert!(err.offenses().iter().any(|o| o.code == OffenseCode::MissingRequiredField));
    }
}
