//! The seven event kinds a run emits (§4.7, §5 of the data model) and the
//! envelope (`EventRecord`) every one of them is wrapped in before it
//! reaches the bus.

use chrono::{DateTime, Utc};
use icecore_core::{NodeId, RunId};
use icecore_execution::RunStatus;
use serde::{Deserialize, Serialize};

/// A single lifecycle event. Tagged with a dotted `kind` string (not
/// `snake_case`-derivable from the variant name, hence the explicit
/// `rename` on each arm) matching the vocabulary `run.started`,
/// `node.started`, `node.finished`, `node.failed`, `node.retry`,
/// `recursive.iteration`, `run.finished`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventKind {
    /// The run transitioned from `pending` to `running`.
    #[serde(rename = "run.started")]
    RunStarted,
    /// A node was dispatched by the Scheduler.
    #[serde(rename = "node.started")]
    NodeStarted {
        node_id: NodeId,
    },
    /// A node completed successfully.
    #[serde(rename = "node.finished")]
    NodeFinished {
        node_id: NodeId,
        output_bytes: u64,
    },
    /// A node's final attempt failed fatally (not retried further).
    #[serde(rename = "node.failed")]
    NodeFailed {
        node_id: NodeId,
        error: String,
    },
    /// A node's attempt failed but will be retried.
    #[serde(rename = "node.retry")]
    NodeRetry {
        node_id: NodeId,
        attempt_number: u32,
        backoff_ms: u64,
    },
    /// A `recursive` node's body ran one more iteration.
    #[serde(rename = "recursive.iteration")]
    RecursiveIteration {
        node_id: NodeId,
        iteration: u32,
    },
    /// The run reached a terminal status.
    #[serde(rename = "run.finished")]
    RunFinished {
        status: RunStatus,
    },
}

/// An `EventKind` stamped with the stream it belongs to, its position in
/// that stream, and when it was emitted. `seq` is monotonically increasing
/// per `run_id` and has no meaning across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub run_id: RunId,
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}
