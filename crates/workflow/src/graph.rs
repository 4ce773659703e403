//! DAG construction and Kahn-style level layering.
//!
//! `Loop`, `Parallel`, and `Recursive` nodes are collapsed to a single
//! synthetic node for layering purposes: a `Loop`'s `body`, a `Parallel`'s
//! `branches`, and everything reachable from a `Recursive`'s `body_entry`
//! are dispatched internally by the Scheduler's own control-flow drivers,
//! not scheduled as ordinary top-level nodes, so none of them ever occupy a
//! level of their own (Design Note, §9: "control flow is a structural
//! feature of a single node, not a graph-level edge visible to the
//! Scheduler's level layering").

use std::collections::{HashMap, HashSet};

use icecore_core::NodeId;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction::Incoming;

use crate::blueprint::Blueprint;
use crate::node::NodeKind;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("blueprint dependency graph contains a cycle")]
    Cycle,
    #[error("recursive node {0} references a body_entry id not present in the blueprint")]
    UnknownBodyEntry(NodeId),
}

/// The dependency DAG extracted from a [`Blueprint`], ready for layering.
pub struct DependencyGraph<'a> {
    blueprint: &'a Blueprint,
    graph: DiGraphMap<NodeId, ()>,
}

impl<'a> DependencyGraph<'a> {
    /// Builds the graph: one node per `NodeSpec`, one edge per declared
    /// dependency (dependency -> dependent).
    pub fn from_blueprint(blueprint: &'a Blueprint) -> Result<Self, GraphError> {
        let mut graph = DiGraphMap::new();
        for node in &blueprint.nodes {
            graph.add_node(node.id);
        }
        for node in &blueprint.nodes {
            for dep in &node.dependencies {
                graph.add_edge(*dep, node.id, ());
            }
        }
        for node in &blueprint.nodes {
            if let NodeKind::Recursive { body_entry, .. } = &node.kind {
                if blueprint.node(*body_entry).is_none() {
                    return Err(GraphError::UnknownBodyEntry(*body_entry));
                }
            }
        }
        if toposort(&graph, None).is_err() {
            return Err(GraphError::Cycle);
        }
        Ok(Self { blueprint, graph })
    }

    /// The set of node ids owned by some control-flow node's body: a
    /// `Loop`'s `body`, a `Parallel`'s `branches`, or everything
    /// forward-reachable from a `Recursive`'s `body_entry` (inclusive) —
    /// all excluded from top-level layering.
    fn control_flow_closures(&self) -> HashSet<NodeId> {
        let mut excluded = HashSet::new();
        for node in &self.blueprint.nodes {
            match &node.kind {
                NodeKind::Recursive { body_entry, .. } => {
                    let mut stack = vec![*body_entry];
                    while let Some(n) = stack.pop() {
                        if excluded.insert(n) {
                            stack.extend(self.graph.neighbors_directed(n, petgraph::Direction::Outgoing));
                        }
                    }
                }
                NodeKind::Loop { body, .. } => {
                    excluded.extend(body.iter().copied());
                }
                NodeKind::Parallel { branches, .. } => {
                    excluded.extend(branches.iter().flatten().copied());
                }
                _ => {}
            }
        }
        excluded
    }

    /// Groups nodes into ordered levels: a node's level is one greater than
    /// the maximum level of its (non-excluded) dependencies, or zero if it
    /// has none. Every dependency of a node in level `k` is guaranteed to
    /// be in some level `< k` (§8 invariant).
    pub fn compute_levels(&self) -> Result<Vec<Vec<NodeId>>, GraphError> {
        let excluded = self.control_flow_closures();
        let order = toposort(&self.graph, None).map_err(|_| GraphError::Cycle)?;

        let mut level: HashMap<NodeId, usize> = HashMap::new();
        for n in order {
            if excluded.contains(&n) {
                continue;
            }
            let deps_level = self
                .graph
                .neighbors_directed(n, Incoming)
                .filter(|d| !excluded.contains(d))
                .filter_map(|d| level.get(&d).copied())
                .max();
            level.insert(n, deps_level.map_or(0, |m| m + 1));
        }

        let max_level = level.values().copied().max();
        let Some(max_level) = max_level else {
            return Ok(Vec::new());
        };
        let mut levels: Vec<Vec<NodeId>> = vec![Vec::new(); max_level + 1];
        for node in &self.blueprint.nodes {
            if let Some(&lvl) = level.get(&node.id) {
                levels[lvl].push(node.id);
            }
        }
        Ok(levels)
    }

    /// Nodes with no (non-excluded) dependencies.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        let excluded = self.control_flow_closures();
        self.blueprint
            .nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| !excluded.contains(id))
            .filter(|id| {
                self.graph
                    .neighbors_directed(*id, Incoming)
                    .all(|d| excluded.contains(&d))
            })
            .collect()
    }

    /// Nodes with no (non-excluded) dependents.
    #[must_use]
    pub fn exit_nodes(&self) -> Vec<NodeId> {
        let excluded = self.control_flow_closures();
        self.blueprint
            .nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| !excluded.contains(id))
            .filter(|id| {
                self.graph
                    .neighbors_directed(*id, petgraph::Direction::Outgoing)
                    .all(|d| excluded.contains(&d))
            })
            .collect()
    }

    /// Number of nodes the Scheduler will dispatch directly — i.e.
    /// excluding nodes absorbed into a `Loop`, `Parallel`, or `Recursive`
    /// node's body.
    #[must_use]
    pub fn scheduled_node_count(&self) -> usize {
        let excluded = self.control_flow_closures();
        self.blueprint.nodes.len() - excluded.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{Blueprint, BlueprintMetadata};
    use crate::node::{NodeKind, NodeSpec};
    use chrono::Utc;
    use icecore_core::BlueprintId;
    use pretty_assertions::assert_eq;

    fn meta() -> BlueprintMetadata {
        BlueprintMetadata {
            name: "g".into(),
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
    fn linear_chain_levels_strictly_increase() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            0,
            meta(),
            vec![
                tool(a),
                tool(b).with_dependencies([a]),
                tool(c).with_dependencies([b]),
            ],
        )
        .unwrap();
        let graph = DependencyGraph::from_blueprint(&bp).unwrap();
        let levels = graph.compute_levels().unwrap();
        assert_eq!(levels, vec![vec![a], vec![b], vec![c]]);
        assert_eq!(graph.entry_nodes(), vec![a]);
        assert_eq!(graph.exit_nodes(), vec![c]);
    }

    #[test]
    fn diamond_converges_at_final_level() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let d = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            0,
            meta(),
            vec![
                tool(a),
                tool(b).with_dependencies([a]),
                tool(c).with_dependencies([a]),
                tool(d).with_dependencies([b, c]),
            ],
        )
        .unwrap();
        let graph = DependencyGraph::from_blueprint(&bp).unwrap();
        let levels = graph.compute_levels().unwrap();
        assert_eq!(levels[0], vec![a]);
        let mut level1 = levels[1].clone();
        level1.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(level1, expected);
        assert_eq!(levels[2], vec![d]);
    }

    #[test]
    fn recursive_body_excluded_from_levels() {
        let outer = NodeId::v4();
        let body_a = NodeId::v4();
        let body_b = NodeId::v4();
        let recursive = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            0,
            meta(),
            vec![
                tool(outer),
                tool(body_a).with_dependencies([outer]),
                tool(body_b).with_dependencies([body_a]),
                NodeSpec::new(
                    recursive,
                    NodeKind::Recursive {
                        body_entry: body_a,
                        convergence_expression: "done".into(),
                        max_iterations: 5,
                        preserve_context_key: None,
                        best_effort: false,
                    },
                )
                .with_dependencies([outer]),
            ],
        )
        .unwrap();
        let graph = DependencyGraph::from_blueprint(&bp).unwrap();
        assert_eq!(graph.scheduled_node_count(), 2); // outer + recursive
        let levels = graph.compute_levels().unwrap();
        let flattened: Vec<_> = levels.into_iter().flatten().collect();
        assert!(!flattened.contains(&body_a));
        assert!(!flattened.contains(&body_b));
        assert!(flattened.contains(&recursive));
    }

    #[test]
    fn loop_body_excluded_from_levels() {
        let outer = NodeId::v4();
        let body_a = NodeId::v4();
        let body_b = NodeId::v4();
        let loop_node = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            0,
            meta(),
            vec![
                tool(outer),
                tool(body_a),
                tool(body_b).with_dependencies([body_a]),
                NodeSpec::new(
                    loop_node,
                    NodeKind::Loop {
                        items_source: crate::node::InputBinding::Variable {
                            field_path: "items".into(),
                        },
                        loop_variable: "item".into(),
                        body: vec![body_a, body_b],
                        max_iterations: None,
                        parallel_items: None,
                    },
                )
                .with_dependencies([outer]),
            ],
        )
        .unwrap();
        let graph = DependencyGraph::from_blueprint(&bp).unwrap();
        assert_eq!(graph.scheduled_node_count(), 2); // outer + loop_node
        let levels = graph.compute_levels().unwrap();
        let flattened: Vec<_> = levels.into_iter().flatten().collect();
        assert!(!flattened.contains(&body_a));
        assert!(!flattened.contains(&body_b));
        assert!(flattened.contains(&loop_node));
    }

    #[test]
    fn parallel_branches_excluded_from_levels() {
        let outer = NodeId::v4();
        let branch_a = NodeId::v4();
        let branch_b = NodeId::v4();
        let parallel_node = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            0,
            meta(),
            vec![
                tool(outer),
                tool(branch_a),
                tool(branch_b),
                NodeSpec::new(
                    parallel_node,
                    NodeKind::Parallel {
                        branches: vec![vec![branch_a], vec![branch_b]],
                        allow_partial: false,
                    },
                )
                .with_dependencies([outer]),
            ],
        )
        .unwrap();
        let graph = DependencyGraph::from_blueprint(&bp).unwrap();
        assert_eq!(graph.scheduled_node_count(), 2); // outer + parallel_node
        let levels = graph.compute_levels().unwrap();
        let flattened: Vec<_> = levels.into_iter().flatten().collect();
        assert!(!flattened.contains(&branch_a));
        assert!(!flattened.contains(&branch_b));
        assert!(flattened.contains(&parallel_node));
    }

    #[test]
    fn dangling_body_entry_rejected() {
        let outer = NodeId::v4();
        let ghost = NodeId::v4();
        let bp = Blueprint::new(
            BlueprintId::v4(),
            1,
            0,
            meta(),
            vec![NodeSpec::new(
                outer,
                NodeKind::Recursive {
                    body_entry: ghost,
                    convergence_expression: "done".into(),
                    max_iterations: 1,
                    preserve_context_key: None,
                    best_effort: false,
                },
            )],
        )
        .unwrap();
        let err = DependencyGraph::from_blueprint(&bp).unwrap_err();
        assert_eq!(err, GraphError::UnknownBodyEntry(ghost));
    }
}
