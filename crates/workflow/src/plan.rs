//! Compiled execution plan: the product of validating and layering a
//! [`Blueprint`], handed to the Scheduler.

use chrono::{DateTime, Utc};
use icecore_core::{BlueprintId, NodeId, RegistryEntryId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::blueprint::Blueprint;
use crate::graph::{DependencyGraph, GraphError};

/// How a node's registry-bound executor was resolved at compile time.
/// `None` for kinds that have no registry binding (`condition`, `loop`,
/// `parallel`, `recursive` dispatch control flow rather than calling out).
pub type RegistryBindings = HashMap<NodeId, RegistryEntryId>;

/// A validated, layered plan ready for the Scheduler. Immutable once built;
/// a new blueprint version always produces a new `Plan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub blueprint_id: BlueprintId,
    pub blueprint_version: u64,
    /// Ordered levels; every node in level `k` depends only on nodes in
    /// levels `< k` (recursive-body nodes are absorbed into their owning
    /// node and never appear here — see [`DependencyGraph`]).
    pub levels: Vec<Vec<NodeId>>,
    pub entry_nodes: Vec<NodeId>,
    pub exit_nodes: Vec<NodeId>,
    pub total_nodes: usize,
    pub registry_bindings: RegistryBindings,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Compiles a `Plan` from a finalized `Blueprint`. Registry binding
    /// resolution (populating `registry_bindings`) is the compiler's job,
    /// done after layering; callers that only need layering shape can pass
    /// an empty map and fill it in afterwards.
    pub fn from_blueprint(
        blueprint: &Blueprint,
        registry_bindings: RegistryBindings,
        created_at: DateTime<Utc>,
    ) -> Result<Self, GraphError> {
        let graph = DependencyGraph::from_blueprint(blueprint)?;
        let levels = graph.compute_levels()?;
        let entry_nodes = graph.entry_nodes();
        let exit_nodes = graph.exit_nodes();
        let total_nodes = graph.scheduled_node_count();
        Ok(Self {
            blueprint_id: blueprint.id,
            blueprint_version: blueprint.version,
            levels,
            entry_nodes,
            exit_nodes,
            total_nodes,
            registry_bindings,
            created_at,
        })
    }

    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// The level index a node is scheduled at, if it is scheduled directly
    /// (i.e. not absorbed into a `Recursive` node's body).
    #[must_use]
    pub fn level_of(&self, id: NodeId) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::BlueprintMetadata;
    use crate::node::{NodeKind, NodeSpec};
    use pretty_assertions::assert_eq;

    fn meta() -> BlueprintMetadata {
        BlueprintMetadata {
            name: "p".into(),
            owner: None,
            created_at: Utc::now(),
            description: None,
        }
    }

    fn tool(id: NodeId) -> NodeSpec {
        NodeSpec::new(
            id,
            NodeKind::Tool {
                tool_name: "noop".into(),
                tool_args: serde_json::json!({}),
            },
        )
    }

    #[test]
    fn plan_preserves_blueprint_identity_and_levels() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            3,
            meta(),
            vec![tool(a), tool(b).with_dependencies([a])],
        )
        .unwrap();
        let plan = Plan::from_blueprint(&bp, HashMap::new(), Utc::now()).unwrap();
        assert_eq!(plan.blueprint_id, bp.id);
        assert_eq!(plan.blueprint_version, 3);
        assert_eq!(plan.total_nodes, 2);
        assert_eq!(plan.level_count(), 2);
        assert_eq!(plan.level_of(a), Some(0));
        assert_eq!(plan.level_of(b), Some(1));
        assert_eq!(plan.entry_nodes, vec![a]);
        assert_eq!(plan.exit_nodes, vec![b]);
    }

    #[test]
    fn plan_serde_roundtrip() {
        let a = NodeId::v4();
        let bp = Blueprint::new(BlueprintId::v4(), 1, 0, meta(), vec![tool(a)]).unwrap();
        let plan = Plan::from_blueprint(&bp, HashMap::new(), Utc::now()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }

    #[test]
    fn single_node_plan_has_one_level() {
        let a = NodeId::v4();
        let bp = Blueprint::new(BlueprintId::v4(), 1, 0, meta(), vec![tool(a)]).unwrap();
        let plan = Plan::from_blueprint(&bp, HashMap::new(), Utc::now()).unwrap();
        assert_eq!(plan.levels, vec![vec![a]]);
    }
}
