//! # icecore-executors
//!
//! Execution abstraction layer for icecore workflow nodes.
//!
//! This crate defines **what** a node executor is and **how it communicates**
//! with the scheduler, not how the scheduler orchestrates a run. It follows
//! the Ports & Drivers architecture: core types and the single-shot,
//! stateless node kinds' executors live here; concrete out-of-scope
//! integrations (LLM providers, tool backends, code sandboxes, sub-blueprint
//! dispatch) are supplied as driver implementations of the port traits this
//! crate defines ([`ToolInvoker`], [`LlmProvider`], [`ExpressionEvaluator`],
//! [`CodeRunner`], [`SubBlueprintRunner`]). The three control-flow kinds that
//! need to dispatch *other* nodes (`loop`, `parallel`, `recursive`) cannot be
//! expressed as a single-shot [`NodeExecutor`] — they're driven directly by
//! `icecore-scheduler` instead.
//!
//! ## Core Types
//!
//! - [`NodeExecutor`] — the trait every node kind's executor implements
//! - [`ActionResult`] — execution result carrying data and flow-control intent
//! - [`ExecutorError`] — error type distinguishing retryable from fatal failures
//! - [`NodeExecutionContext`] — runtime context with IDs, variables, cancellation
//! - [`ExecutorMetadata`] — static descriptor (key, version, capabilities)
//! - [`ExecutorRegistry`] — process-local `key -> Arc<dyn NodeExecutor>` dispatch table
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use icecore_executors::*;
//! use async_trait::async_trait;
//!
//! struct MyTool;
//!
//! #[async_trait]
//! impl ToolInvoker for MyTool {
//!     async fn invoke(
//!         &self,
//!         tool_name: &str,
//!         args: serde_json::Value,
//!         _ctx: &NodeExecutionContext,
//!     ) -> Result<serde_json::Value, ExecutorError> {
//!         Ok(serde_json::json!({"tool": tool_name, "args": args}))
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Capability declarations and isolation levels for sandboxed execution.
pub mod capability;
/// Runtime context provided to node executors during execution.
pub mod context;
/// Error types distinguishing retryable from fatal failures.
pub mod error;
/// The `NodeExecutor` trait and the single-shot kind-specific executor implementations.
pub mod executor;
/// Static metadata and versioning descriptors.
pub mod metadata;
/// Output data representations (inline JSON and blob references).
pub mod output;
/// Execution result types carrying data and flow-control intent.
pub mod result;
/// Execution budget and data passing policies.
pub mod budget;
/// Executor registry for type-erased discovery and lookup.
pub mod registry;
/// Sandboxed execution context and runner port trait.
pub mod sandbox;
/// Convenience re-exports for executor authors.
pub mod prelude;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use capability::{Capability, IsolationLevel};
pub use context::NodeExecutionContext;
pub use error::ExecutorError;
pub use executor::{
    AgentExecutor, CodeExecutor, CodeRunner, ConditionExecutor, ExpressionEvaluator, LlmExecutor,
    LlmProvider, LlmRequest, NodeExecutor, SubBlueprintRunner, ToolExecutor, ToolInvoker,
    WorkflowExecutor,
};
pub use metadata::ExecutorMetadata;
pub use output::NodeOutputData;
pub use result::{ActionResult, BreakReason, BranchKey, PortKey, WaitCondition};

pub use budget::{DataPassingPolicy, ExecutionBudget, LargeDataStrategy};
pub use registry::ExecutorRegistry;
pub use sandbox::{SandboxRunner, SandboxedContext};
