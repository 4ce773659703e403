//! Convenience re-exports for executor authors.
//!
//! ```rust,ignore
//! use icecore_executors::prelude::*;
//! ```

pub use crate::capability::{Capability, IsolationLevel};
pub use crate::context::NodeExecutionContext;
pub use crate::error::ExecutorError;
pub use crate::executor::{
    AgentExecutor, CodeExecutor, CodeRunner, ConditionExecutor, ExpressionEvaluator, LlmExecutor,
    LlmProvider, LlmRequest, NodeExecutor, SubBlueprintRunner, ToolExecutor, ToolInvoker,
    WorkflowExecutor,
};
pub use crate::metadata::ExecutorMetadata;
pub use crate::output::NodeOutputData;
pub use crate::result::{ActionResult, BreakReason, BranchKey, PortKey, WaitCondition};

pub use crate::budget::{DataPassingPolicy, ExecutionBudget, LargeDataStrategy};
pub use crate::registry::ExecutorRegistry;
pub use crate::sandbox::{SandboxRunner, SandboxedContext};
