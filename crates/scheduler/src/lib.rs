#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # icecore-scheduler
//!
//! The level-parallel DAG execution loop. Given a compiled
//! [`Plan`](icecore_workflow::Plan) and the [`Blueprint`](icecore_workflow::Blueprint)
//! it was compiled from, [`Scheduler::run`] dispatches each level's nodes to
//! their registered executors, tracks per-node attempts and retries, honors
//! `when` guards and `continue_on_error`, and emits the run's event stream.
//!
//! This crate does NOT define the node executors themselves (`icecore-executors`),
//! the persistent run/node state model (`icecore-execution`), the DAG/plan
//! data structures (`icecore-workflow`), or the event log (`icecore-eventbus`)
//! — it only orchestrates them. It defines:
//!
//! - [`Scheduler`] — the level-parallel dispatch loop
//! - [`resolve_node_input`] — static node payload + `input_bindings` resolution
//! - [`backoff_for`] — exponential backoff with full jitter for node retries
//! - [`StepOutcome`] and [`interpret`] — executor result interpretation

pub mod input;
pub mod output;
pub mod retry;
pub mod scheduler;

pub use input::resolve_node_input;
pub use output::{byte_len, interpret, StepOutcome};
pub use retry::backoff_for;
pub use scheduler::Scheduler;
