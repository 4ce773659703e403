//! icecore-workflow
//!
//! The Blueprint/NodeSpec data model and DAG layering shared by the
//! Validator/Compiler, Scheduler, and Node Executors.

#![forbid(unsafe_code)]

pub mod blueprint;
pub mod graph;
pub mod node;
pub mod plan;
pub mod state;

pub use blueprint::{Blueprint, BlueprintMetadata, BlueprintShapeError, PartialBlueprint};
pub use graph::{DependencyGraph, GraphError};
pub use node::{InputBinding, NodeKind, NodeSpec, RetryPolicy, WhenClause};
pub use plan::{Plan, RegistryBindings};
pub use state::NodeState;

pub mod prelude {
    pub use crate::{
        Blueprint, BlueprintMetadata, BlueprintShapeError, DependencyGraph, GraphError,
        InputBinding, NodeKind, NodeSpec, NodeState, PartialBlueprint, Plan, RegistryBindings,
        RetryPolicy, WhenClause,
    };
}
