//! Declarative node specification: the nine node kinds and the fields every
//! kind shares.

use std::collections::{BTreeSet, HashMap};

use icecore_core::NodeId;
use serde::{Deserialize, Serialize};

/// How a node's input field is populated before the executor runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InputBinding {
    /// A constant value baked into the blueprint.
    Literal { value: serde_json::Value },
    /// A dotted-path lookup into an upstream node's output.
    Reference {
        upstream_id: NodeId,
        field_path: String,
    },
    /// A dotted-path lookup into the run's top-level variables.
    Variable { field_path: String },
}

/// Retry policy for a node's executor invocation. Backoff is exponential
/// with full jitter, bounded by `backoff_max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_base_ms: 200,
            backoff_max_ms: 10_000,
            jitter: true,
        }
    }
}

/// A guard evaluated before a node is dispatched; if it evaluates false the
/// node is skipped rather than executed. Used by downstream nodes that
/// predicate on a `condition` node's branch (§4.5.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub expression: String,
}

/// Kind-specific payload. Tagged so a `NodeSpec` serializes with
/// `"kind": "tool"` alongside its kind's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Invokes a registered tool by name with JSON arguments (§4.5.1).
    Tool {
        tool_name: String,
        tool_args: serde_json::Value,
    },
    /// Single completion call against a registered LLM provider (§4.5.2).
    Llm {
        provider: String,
        model: String,
        #[serde(default)]
        system_prompt: Option<String>,
        prompt: String,
        #[serde(default)]
        temperature: Option<f64>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        response_schema: Option<serde_json::Value>,
    },
    /// Tool-calling loop bounded by `max_iterations` (§4.5.3).
    Agent {
        system_prompt: String,
        tools: Vec<String>,
        #[serde(default)]
        max_iterations: Option<u32>,
    },
    /// Branches execution by evaluating an expression (§4.5.4).
    Condition { expression: String },
    /// Iterates `body` once per item of `items_source`, optionally in
    /// parallel batches of `parallel_items` (§4.5.5).
    Loop {
        items_source: InputBinding,
        loop_variable: String,
        body: Vec<NodeId>,
        #[serde(default)]
        max_iterations: Option<u32>,
        #[serde(default)]
        parallel_items: Option<usize>,
    },
    /// Runs every branch concurrently; `allow_partial` controls whether one
    /// branch's failure fails the whole node (§4.5.6).
    Parallel {
        branches: Vec<Vec<NodeId>>,
        allow_partial: bool,
    },
    /// Re-invokes its body subgraph until `convergence_expression` holds or
    /// `max_iterations` is reached (§4.5.7).
    Recursive {
        body_entry: NodeId,
        convergence_expression: String,
        max_iterations: u32,
        #[serde(default)]
        preserve_context_key: Option<String>,
        #[serde(default)]
        best_effort: bool,
    },
    /// Invokes another registered blueprint as a single node (§4.5.8).
    Workflow {
        workflow_ref: String,
        #[serde(default)]
        workflow_version: Option<u32>,
    },
    /// Runs sandboxed source in a scripting language (§4.5.9).
    Code {
        language: String,
        source: String,
        #[serde(default)]
        inputs: Vec<String>,
        #[serde(default)]
        outputs: Vec<String>,
    },
}

impl NodeKind {
    /// Short lowercase name for logging/metrics, matching the serde tag.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Tool { .. } => "tool",
            Self::Llm { .. } => "llm",
            Self::Agent { .. } => "agent",
            Self::Condition { .. } => "condition",
            Self::Loop { .. } => "loop",
            Self::Parallel { .. } => "parallel",
            Self::Recursive { .. } => "recursive",
            Self::Workflow { .. } => "workflow",
            Self::Code { .. } => "code",
        }
    }
}

/// A single node within a [`crate::blueprint::Blueprint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    /// Human-readable identifier other nodes' `when` clauses reference by
    /// name (e.g. `gate.branch == "true"`); blueprints that never reference
    /// a node by name can leave this unset.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub dependencies: BTreeSet<NodeId>,
    #[serde(default)]
    pub input_bindings: HashMap<String, InputBinding>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub when: Option<WhenClause>,
}

impl NodeSpec {
    /// Convenience constructor for the common case of no retry/timeout/tags.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            name: None,
            kind,
            dependencies: BTreeSet::new(),
            input_bindings: HashMap::new(),
            output_schema: None,
            retry_policy: None,
            timeout_ms: None,
            tags: Vec::new(),
            continue_on_error: false,
            when: None,
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = NodeId>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn retry_policy_or_default(&self) -> RetryPolicy {
        self.retry_policy.unwrap_or_default()
    }
}
