#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # icecore-execution
//!
//! Runtime execution state, idempotency, error taxonomy, and run context for
//! icecore. This crate models execution-time concepts — it does NOT contain
//! the scheduler orchestrator. It defines:
//!
//! - [`IceError`] and [`IceErrorKind`] — the crate-wide error taxonomy (§7)
//! - [`RunStatus`] — run-level state machine (5 states)
//! - [`RunState`] and [`NodeExecutionState`] — persistent state tracking
//! - [`RunContext`] — runtime context with shared state and cancellation
//! - [`NodeOutput`] — node output data with metadata
//! - [`NodeAttempt`] — individual execution attempt tracking
//! - [`IdempotencyKey`] and [`IdempotencyManager`] — the at-least-once
//!   de-duplication hook
//! - State machine transitions validated by the [`transition`] module
//!
//! Event logging (the append-only per-run journal) and DAG layering (the
//! compiled [`Plan`](icecore_workflow::Plan)) live in `icecore-eventbus` and
//! `icecore-workflow` respectively, not here.

pub mod attempt;
pub mod context;
pub mod error;
pub mod idempotency;
pub mod output;
pub mod state;
pub mod status;
pub mod transition;

pub use attempt::NodeAttempt;
pub use context::RunContext;
pub use error::{ErrorInfo, IceError, IceErrorKind};
pub use idempotency::{IdempotencyKey, IdempotencyManager};
pub use output::{ExecutionOutput, NodeOutput};
pub use state::{NodeExecutionState, RunState};
pub use status::RunStatus;

/// Serde helper for `Option<Duration>` serialized as milliseconds.
pub(crate) mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Serialize an `Option<Duration>` as an optional integer of milliseconds.
    pub fn serialize<S: Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(s),
            None => s.serialize_none(),
        }
    }

    /// Deserialize an optional integer of milliseconds into `Option<Duration>`.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(d)?;
        Ok(opt.map(Duration::from_millis))
    }
}
