//! Blueprint aggregate: the immutable, versioned DAG of [`NodeSpec`]s that
//! the compiler validates and the scheduler executes.

use chrono::{DateTime, Utc};
use icecore_core::BlueprintId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::node::NodeSpec;

/// Author-facing metadata carried alongside the DAG itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintMetadata {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Structural error raised when a set of nodes does not form a valid
/// `Blueprint` aggregate. Content validation (registry bindings, expression
/// syntax, budget estimates) is the Validator/Compiler's job, not this
/// type's — this only enforces the two invariants that make the data
/// structure itself coherent.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlueprintShapeError {
    #[error("blueprint has no nodes")]
    Empty,
    #[error("duplicate node id in blueprint")]
    DuplicateNodeId,
    #[error("node references unknown dependency id")]
    DanglingDependency,
}

/// An immutable, finalized workflow aggregate: schema version, metadata, and
/// a DAG of nodes. Produced only by [`PartialBlueprint::finalize`] or by the
/// compiler after validation succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: BlueprintId,
    pub schema_version: u32,
    pub version: u64,
    pub metadata: BlueprintMetadata,
    pub nodes: Vec<NodeSpec>,
}

impl Blueprint {
    /// Builds a `Blueprint`, checking the two structural invariants: node
    /// ids are unique, and every declared dependency resolves to a node that
    /// exists in this same blueprint. Acyclicity is checked separately by
    /// [`crate::graph::DependencyGraph::from_blueprint`], since that walk
    /// is also needed for layering and there is no reason to pay for it
    /// twice.
    pub fn new(
        id: BlueprintId,
        schema_version: u32,
        version: u64,
        metadata: BlueprintMetadata,
        nodes: Vec<NodeSpec>,
    ) -> Result<Self, BlueprintShapeError> {
        if nodes.is_empty() {
            return Err(BlueprintShapeError::Empty);
        }
        let ids: HashSet<_> = nodes.iter().map(|n| n.id).collect();
        if ids.len() != nodes.len() {
            return Err(BlueprintShapeError::DuplicateNodeId);
        }
        for node in &nodes {
            if node.dependencies.iter().any(|d| !ids.contains(d)) {
                return Err(BlueprintShapeError::DanglingDependency);
            }
        }
        Ok(Self {
            id,
            schema_version,
            version,
            metadata,
            nodes,
        })
    }

    #[must_use]
    pub fn node(&self, id: icecore_core::NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// The mutable, in-progress counterpart of [`Blueprint`], held by the
/// Blueprint Store while an author is still iterating. May contain dangling
/// references and open design questions; `finalize` is the only path to a
/// `Blueprint`, matching Design Note "no one-node-blueprint special case"
/// (§9) — finalization is uniform regardless of how many nodes exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialBlueprint {
    pub id: BlueprintId,
    pub schema_version: u32,
    pub version: u64,
    pub metadata: BlueprintMetadata,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub is_finalized: bool,
}

impl PartialBlueprint {
    #[must_use]
    pub fn new(id: BlueprintId, schema_version: u32, metadata: BlueprintMetadata) -> Self {
        Self {
            id,
            schema_version,
            version: 0,
            metadata,
            nodes: Vec::new(),
            open_questions: Vec::new(),
            is_finalized: false,
        }
    }

    /// Converts this draft into a `Blueprint`, re-checking the structural
    /// invariants. The compiler is responsible for running full validation
    /// (registry bindings, acyclicity, budget estimate) before calling this;
    /// this method alone does not make the result safe to execute.
    pub fn finalize(self) -> Result<Blueprint, BlueprintShapeError> {
        Blueprint::new(
            self.id,
            self.schema_version,
            self.version,
            self.metadata,
            self.nodes,
        )
    }
}
