//! Materialized run output types.
//!
//! [`ExecutionOutput`] is the persistence-ready form of a node's output: by
//! the time data reaches this type, the executor's own producer-facing
//! [`icecore_executors::NodeOutputData`] has been resolved and, if large,
//! spilled to blob storage per the run's `DataPassingPolicy`.
//!
//! [`NodeOutput`] wraps `ExecutionOutput` with the node's terminal state and
//! timing — this is the shape that [`crate::context::RunContext`] stores and
//! that a gateway (out of scope here) would serialize back to a caller.

use chrono::{DateTime, Utc};
use icecore_workflow::NodeState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Materialized output data for persistence and inter-node transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionOutput {
    /// Small data, stored inline as JSON.
    Inline(serde_json::Value),
    /// Large data, stored in blob storage and referenced by key.
    BlobRef { key: String, size: u64, mime: String },
}

impl ExecutionOutput {
    pub fn inline(value: serde_json::Value) -> Self {
        Self::Inline(value)
    }

    pub fn blob(key: impl Into<String>, size: u64, mime: impl Into<String>) -> Self {
        Self::BlobRef {
            key: key.into(),
            size,
            mime: mime.into(),
        }
    }

    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    #[must_use]
    pub fn is_blob_ref(&self) -> bool {
        matches!(self, Self::BlobRef { .. })
    }

    #[must_use]
    pub fn as_inline(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Inline(v) => Some(v),
            Self::BlobRef { .. } => None,
        }
    }
}

/// A node's materialized output, tagged with the state it was produced in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutput {
    pub data: ExecutionOutput,
    pub status: NodeState,
    pub produced_at: DateTime<Utc>,
    #[serde(default, with = "crate::serde_duration_opt")]
    pub duration: Option<Duration>,
    pub bytes: u64,
}

impl NodeOutput {
    #[must_use]
    pub fn inline(value: serde_json::Value, status: NodeState, bytes: u64) -> Self {
        Self {
            data: ExecutionOutput::inline(value),
            status,
            produced_at: Utc::now(),
            duration: None,
            bytes,
        }
    }

    #[must_use]
    pub fn blob_ref(
        key: impl Into<String>,
        size: u64,
        mime: impl Into<String>,
        status: NodeState,
    ) -> Self {
        Self {
            data: ExecutionOutput::blob(key, size, mime),
            status,
            produced_at: Utc::now(),
            duration: None,
            bytes: size,
        }
    }

    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.data.is_inline()
    }

    #[must_use]
    pub fn is_blob_ref(&self) -> bool {
        self.data.is_blob_ref()
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        self.data.as_inline()
    }
}
