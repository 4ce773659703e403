use std::time::Duration;

/// Error type for all node executor operations.
///
/// Distinguishes retryable from fatal errors so the scheduler can decide
/// retry policy (backoff, max attempts, budget) without the executor
/// needing to know about resilience patterns.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// Transient failure — scheduler may retry based on the node's
    /// `retry_policy`.
    #[error("retryable: {error}")]
    Retryable {
        /// Human-readable error message.
        error: String,
        /// Suggested delay before retry (scheduler may override).
        backoff_hint: Option<Duration>,
        /// Partial result produced before failure.
        partial_output: Option<serde_json::Value>,
    },

    /// Permanent failure — never retry.
    #[error("fatal: {error}")]
    Fatal {
        /// Human-readable error message.
        error: String,
        /// Optional structured details about the failure.
        details: Option<serde_json::Value>,
    },

    /// Input validation failed before execution began.
    #[error("validation: {0}")]
    Validation(String),

    /// Node requested a capability it was not granted.
    #[error("sandbox violation: capability `{capability}` denied for node `{node_id}`")]
    SandboxViolation {
        /// The capability that was denied.
        capability: String,
        /// The node that requested the capability.
        node_id: String,
    },

    /// Execution cancelled via cancellation token.
    #[error("cancelled")]
    Cancelled,

    /// Output exceeds the configured data limit.
    #[error("data limit exceeded: {actual_bytes} bytes > {limit_bytes} bytes limit")]
    DataLimitExceeded {
        /// Maximum allowed output size in bytes.
        limit_bytes: u64,
        /// Actual output size in bytes.
        actual_bytes: u64,
    },

    /// A `code` node exceeded its sandbox memory or CPU-time ceiling.
    #[error("code resource exceeded: {0}")]
    CodeResourceExceeded(String),

    /// An `agent` node exhausted its iteration budget without converging.
    #[error("agent exhausted its iteration budget after {iterations} iterations")]
    AgentExhausted {
        /// How many iterations were attempted.
        iterations: u32,
    },
}

impl ExecutorError {
    /// Create a retryable error with no backoff hint.
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable {
            error: msg.into(),
            backoff_hint: None,
            partial_output: None,
        }
    }

    /// Create a retryable error with a suggested backoff duration.
    pub fn retryable_with_backoff(msg: impl Into<String>, backoff: Duration) -> Self {
        Self::Retryable {
            error: msg.into(),
            backoff_hint: Some(backoff),
            partial_output: None,
        }
    }

    /// Create a retryable error carrying a partial result.
    pub fn retryable_with_partial(msg: impl Into<String>, partial: serde_json::Value) -> Self {
        Self::Retryable {
            error: msg.into(),
            backoff_hint: None,
            partial_output: Some(partial),
        }
    }

    /// Create a fatal (non-retryable) error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal {
            error: msg.into(),
            details: None,
        }
    }

    /// Create a fatal error with structured details.
    pub fn fatal_with_details(msg: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Fatal {
            error: msg.into(),
            details: Some(details),
        }
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns `true` if the scheduler should consider retrying this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Returns `true` if this error is permanent and should never be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Fatal { .. }
                | Self::Validation(_)
                | Self::SandboxViolation { .. }
                | Self::DataLimitExceeded { .. }
                | Self::CodeResourceExceeded(_)
                | Self::AgentExhausted { .. }
        )
    }

    /// Extract the backoff hint, if present.
    #[must_use]
    pub fn backoff_hint(&self) -> Option<Duration> {
        match self {
            Self::Retryable { backoff_hint, .. } => *backoff_hint,
            _ => None,
        }
    }

    /// Extract the partial output, if present.
    #[must_use]
    pub fn partial_output(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Retryable { partial_output, .. } => partial_output.as_ref(),
            _ => None,
        }
    }
}

// `icecore-execution`'s `From<ExecutorError> for IceError` performs the mapping
// onto the crate-wide error taxonomy; `icecore-executors` sits below it in the
// dependency graph and does not depend back on it.
