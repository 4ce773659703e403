//! Node executors: one [`NodeExecutor`] implementation per node kind.
//!
//! This module follows the same Ports & Drivers split the rest of the crate
//! uses (`SandboxRunner`, `CredentialProvider` in earlier revisions): each
//! executor that needs a concrete external capability — calling a tool,
//! calling an LLM provider, running sandboxed code, evaluating an expression,
//! invoking a sub-blueprint — takes that capability as a port trait rather
//! than depending on a concrete implementation. Concrete providers are out of
//! scope here; the runtime wires real implementations in at startup.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::NodeExecutionContext;
use crate::error::ExecutorError;
use crate::metadata::ExecutorMetadata;
use crate::result::{ActionResult, BreakReason};

/// Common interface every node kind's executor implements.
///
/// The scheduler resolves a `NodeSpec.kind` to one of these via the
/// [`crate::registry::ExecutorRegistry`] and invokes `execute` once per
/// attempt, passing the already-resolved input (upstream outputs and
/// variables bound according to the node's `input_bindings`).
#[async_trait]
pub trait NodeExecutor: Send + Sync + 'static {
    /// Static metadata describing this executor.
    fn metadata(&self) -> &ExecutorMetadata;

    /// Run the node once.
    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
        input: serde_json::Value,
    ) -> Result<ActionResult<serde_json::Value>, ExecutorError>;
}

/// Port trait for invoking a named tool with JSON arguments.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke `tool_name` with `args`, returning its JSON output.
    async fn invoke(
        &self,
        tool_name: &str,
        args: serde_json::Value,
        ctx: &NodeExecutionContext,
    ) -> Result<serde_json::Value, ExecutorError>;
}

/// Executes `tool` nodes by delegating to a [`ToolInvoker`].
pub struct ToolExecutor {
    metadata: ExecutorMetadata,
    invoker: Arc<dyn ToolInvoker>,
}

impl ToolExecutor {
    /// Build a tool executor backed by the given invoker.
    #[must_use]
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            metadata: ExecutorMetadata::new("tool", "Tool", "Invokes a registered tool by name"),
            invoker,
        }
    }
}

#[async_trait]
impl NodeExecutor for ToolExecutor {
    fn metadata(&self) -> &ExecutorMetadata {
        &self.metadata
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
        input: serde_json::Value,
    ) -> Result<ActionResult<serde_json::Value>, ExecutorError> {
        ctx.check_cancelled()?;
        let tool_name = input
            .get("tool_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExecutorError::validation("tool node input missing `tool_name`"))?;
        let args = input.get("tool_args").cloned().unwrap_or_default();
        let output = self.invoker.invoke(tool_name, args, ctx).await?;
        Ok(ActionResult::success(output))
    }
}

/// A single LLM completion request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_schema: Option<serde_json::Value>,
}

/// Port trait for a concrete LLM provider integration.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a single completion request.
    async fn complete(&self, request: LlmRequest) -> Result<serde_json::Value, ExecutorError>;
}

/// Executes `llm` nodes by delegating to an [`LlmProvider`].
pub struct LlmExecutor {
    metadata: ExecutorMetadata,
    provider: Arc<dyn LlmProvider>,
}

impl LlmExecutor {
    /// Build an LLM executor backed by the given provider.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            metadata: ExecutorMetadata::new("llm", "LLM", "Runs a single LLM completion"),
            provider,
        }
    }
}

#[async_trait]
impl NodeExecutor for LlmExecutor {
    fn metadata(&self) -> &ExecutorMetadata {
        &self.metadata
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
        input: serde_json::Value,
    ) -> Result<ActionResult<serde_json::Value>, ExecutorError> {
        ctx.check_cancelled()?;
        let request = LlmRequest {
            provider: field_str(&input, "provider")?,
            model: field_str(&input, "model")?,
            system_prompt: input
                .get("system_prompt")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
            prompt: field_str(&input, "prompt")?,
            temperature: input.get("temperature").and_then(serde_json::Value::as_f64).map(|t| t as f32),
            max_tokens: input
                .get("max_tokens")
                .and_then(serde_json::Value::as_u64)
                .map(|t| t as u32),
            response_schema: input.get("response_schema").cloned(),
        };
        let output = self.provider.complete(request).await?;
        Ok(ActionResult::success(output))
    }
}

/// Executes `agent` nodes: a bounded LLM + tool-calling loop.
///
/// Iterates up to `max_iterations` times, each time letting the provider
/// decide whether to call a tool or finish. Exceeding the budget without the
/// provider signaling completion yields [`ExecutorError::AgentExhausted`].
pub struct AgentExecutor {
    metadata: ExecutorMetadata,
    provider: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolInvoker>,
}

impl AgentExecutor {
    /// Build an agent executor backed by the given LLM provider and tool invoker.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<dyn ToolInvoker>) -> Self {
        Self {
            metadata: ExecutorMetadata::new(
                "agent",
                "Agent",
                "Bounded LLM + tool-calling loop",
            ),
            provider,
            tools,
        }
    }
}

#[async_trait]
impl NodeExecutor for AgentExecutor {
    fn metadata(&self) -> &ExecutorMetadata {
        &self.metadata
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
        input: serde_json::Value,
    ) -> Result<ActionResult<serde_json::Value>, ExecutorError> {
        let max_iterations = input
            .get("max_iterations")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(10) as u32;
        let system_prompt = input.get("system_prompt").and_then(|v| v.as_str()).map(str::to_owned);
        let mut transcript = input.get("prompt").cloned().unwrap_or_default();

        for iteration in 0..max_iterations {
            ctx.check_cancelled()?;
            let response = self
                .provider
                .complete(LlmRequest {
                    provider: field_str(&input, "provider").unwrap_or_default(),
                    model: field_str(&input, "model").unwrap_or_default(),
                    system_prompt: system_prompt.clone(),
                    prompt: transcript.to_string(),
                    temperature: None,
                    max_tokens: None,
                    response_schema: None,
                })
                .await?;

            if let Some(tool_call) = response.get("tool_call") {
                let tool_name = tool_call
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ExecutorError::validation("agent tool_call missing `name`"))?;
                let args = tool_call.get("args").cloned().unwrap_or_default();
                let tool_output = self.tools.invoke(tool_name, args, ctx).await?;
                transcript = serde_json::json!({"previous": transcript, "tool_output": tool_output});
                continue;
            }

            if response.get("final_answer").is_some() {
                return Ok(ActionResult::Break {
                    output: response,
                    reason: BreakReason::Completed,
                });
            }

            if iteration + 1 == max_iterations {
                return Err(ExecutorError::AgentExhausted {
                    iterations: max_iterations,
                });
            }
        }

        Err(ExecutorError::AgentExhausted {
            iterations: max_iterations,
        })
    }
}

/// Port trait for evaluating the icecore expression mini-language.
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` against `variables`, returning its result.
    async fn evaluate(
        &self,
        expression: &str,
        variables: &serde_json::Value,
    ) -> Result<serde_json::Value, ExecutorError>;
}

/// Executes `condition` nodes: evaluate an expression, branch on its truthiness.
pub struct ConditionExecutor {
    metadata: ExecutorMetadata,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ConditionExecutor {
    /// Build a condition executor backed by the given expression evaluator.
    #[must_use]
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            metadata: ExecutorMetadata::new(
                "condition",
                "Condition",
                "Evaluates an expression and branches on its truthiness",
            ),
            evaluator,
        }
    }
}

#[async_trait]
impl NodeExecutor for ConditionExecutor {
    fn metadata(&self) -> &ExecutorMetadata {
        &self.metadata
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
        input: serde_json::Value,
    ) -> Result<ActionResult<serde_json::Value>, ExecutorError> {
        ctx.check_cancelled()?;
        let expression = field_str(&input, "expression")?;
        let variables = input.get("variables").cloned().unwrap_or_default();
        let result = self.evaluator.evaluate(&expression, &variables).await?;
        let truthy = is_truthy(&result);
        let selected = if truthy { "true" } else { "false" };
        Ok(ActionResult::Branch {
            selected: selected.to_string(),
            output: result,
            alternatives: std::collections::HashMap::new(),
        })
    }
}

/// Port trait for invoking a sub-blueprint by reference.
#[async_trait]
pub trait SubBlueprintRunner: Send + Sync {
    /// Run `workflow_ref` at `workflow_version` (or the latest if `None`)
    /// with the given input, returning its final output.
    async fn run(
        &self,
        workflow_ref: &str,
        workflow_version: Option<u64>,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ExecutorError>;
}

/// Executes `workflow` nodes by delegating to a [`SubBlueprintRunner`].
pub struct WorkflowExecutor {
    metadata: ExecutorMetadata,
    runner: Arc<dyn SubBlueprintRunner>,
}

impl WorkflowExecutor {
    /// Build a workflow executor backed by the given sub-blueprint runner.
    #[must_use]
    pub fn new(runner: Arc<dyn SubBlueprintRunner>) -> Self {
        Self {
            metadata: ExecutorMetadata::new(
                "workflow",
                "Workflow",
                "Invokes another blueprint as a sub-run",
            ),
            runner,
        }
    }
}

#[async_trait]
impl NodeExecutor for WorkflowExecutor {
    fn metadata(&self) -> &ExecutorMetadata {
        &self.metadata
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
        input: serde_json::Value,
    ) -> Result<ActionResult<serde_json::Value>, ExecutorError> {
        ctx.check_cancelled()?;
        let workflow_ref = field_str(&input, "workflow_ref")?;
        let workflow_version = input.get("workflow_version").and_then(serde_json::Value::as_u64);
        let sub_input = input.get("input").cloned().unwrap_or_default();
        let output = self
            .runner
            .run(&workflow_ref, workflow_version, sub_input)
            .await?;
        Ok(ActionResult::success(output))
    }
}

/// Port trait for running sandboxed `code` node source.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Run `source`, written in `language`, against `inputs`.
    async fn run(
        &self,
        language: &str,
        source: &str,
        inputs: serde_json::Value,
    ) -> Result<serde_json::Value, ExecutorError>;
}

/// Executes `code` nodes inside a sandbox, enforcing the
/// `CODE_SANDBOX_MEM_MB`/`CODE_SANDBOX_CPU_MS` ceilings via the
/// [`CodeRunner`] port.
pub struct CodeExecutor {
    metadata: ExecutorMetadata,
    runner: Arc<dyn CodeRunner>,
}

impl CodeExecutor {
    /// Build a code executor backed by the given sandboxed runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CodeRunner>) -> Self {
        Self {
            metadata: ExecutorMetadata::new("code", "Code", "Runs sandboxed source code")
                .with_isolation(crate::capability::IsolationLevel::Isolated),
            runner,
        }
    }
}

#[async_trait]
impl NodeExecutor for CodeExecutor {
    fn metadata(&self) -> &ExecutorMetadata {
        &self.metadata
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
        input: serde_json::Value,
    ) -> Result<ActionResult<serde_json::Value>, ExecutorError> {
        ctx.check_cancelled()?;
        let language = field_str(&input, "language")?;
        let source = field_str(&input, "source")?;
        let inputs = input.get("inputs").cloned().unwrap_or_default();
        let output = self.runner.run(&language, &source, inputs).await?;
        Ok(ActionResult::success(output))
    }
}

fn field_str(input: &serde_json::Value, key: &str) -> Result<String, ExecutorError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| ExecutorError::validation(format!("node input missing `{key}`")))
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Null => false,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}
