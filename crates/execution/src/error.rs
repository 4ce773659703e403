//! Central error type. Every crate-local error (`RegistryError`, `StoreError`,
//! `CompileError`, `ExecutorError`, `icecore_workflow::BlueprintShapeError`,
//! `icecore_workflow::GraphError`) converts into [`IceError`] via `From`, the
//! way each upstream crate keeps a local `thiserror` enum that the
//! engine layer folds into one broader failure type.

use serde::{Deserialize, Serialize};

/// The fixed error taxonomy every component reports through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IceErrorKind {
    /// A blueprint or input failed structural or semantic validation.
    Validation,
    /// A referenced entity (registry entry, blueprint, run, node) does not exist.
    NotFound,
    /// An optimistic-concurrency version did not match the current one.
    VersionMismatch,
    /// A node's kind requires a registry binding that was never resolved.
    RegistryBindingMissing,
    /// A node or run exceeded its wall-clock budget.
    Timeout,
    /// The run or node was cancelled cooperatively.
    Cancelled,
    /// A cost or resource budget was exceeded.
    BudgetExceeded,
    /// An `agent` node exhausted its iteration budget without converging.
    AgentExhausted,
    /// A `recursive` node exhausted its iteration budget without converging.
    NonConvergent,
    /// A `code` node exceeded its sandbox memory or CPU-time ceiling.
    CodeResourceExceeded,
    /// A `tool` node's underlying call failed.
    ToolExecution,
    /// An `llm` node's provider call failed.
    LLMProvider,
    /// An error that does not fit the other kinds — a bug or an invariant
    /// violation, not something a caller can act on.
    Internal,
}

impl IceErrorKind {
    /// Returns `true` for kinds that represent a transient condition a
    /// retry policy may reasonably retry on. This is a default
    /// classification at the kind level; per-node `retry_policy` is what
    /// actually governs whether a retry happens.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::ToolExecution | Self::LLMProvider)
    }
}

impl std::fmt::Display for IceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::VersionMismatch => "version_mismatch",
            Self::RegistryBindingMissing => "registry_binding_missing",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::BudgetExceeded => "budget_exceeded",
            Self::AgentExhausted => "agent_exhausted",
            Self::NonConvergent => "non_convergent",
            Self::CodeResourceExceeded => "code_resource_exceeded",
            Self::ToolExecution => "tool_execution",
            Self::LLMProvider => "llm_provider",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Wire-safe snapshot of an error: a gateway crate (out of scope here) would
/// serialize this directly onto an HTTP/SSE response (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: IceErrorKind,
    pub message: String,
}

/// The crate-wide error type. Carries a classification ([`IceErrorKind`]), a
/// human-readable message, and an optional source error for `tracing`/log
/// chains — the source is not serialized; use [`IceError::to_wire`] for the
/// serializable projection.
#[derive(Debug)]
pub struct IceError {
    pub kind: IceErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl IceError {
    pub fn new(kind: IceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(IceErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(IceErrorKind::NotFound, message)
    }

    pub fn version_mismatch(message: impl Into<String>) -> Self {
        Self::new(IceErrorKind::VersionMismatch, message)
    }

    pub fn registry_binding_missing(message: impl Into<String>) -> Self {
        Self::new(IceErrorKind::RegistryBindingMissing, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(IceErrorKind::Timeout, message)
    }

    pub fn cancelled() -> Self {
        Self::new(IceErrorKind::Cancelled, "cancelled")
    }

    pub fn budget_exceeded(message: impl Into<String>) -> Self {
        Self::new(IceErrorKind::BudgetExceeded, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(IceErrorKind::Internal, message)
    }

    #[must_use]
    pub fn is_retryable_by_default(&self) -> bool {
        self.kind.is_transient()
    }

    #[must_use]
    pub fn to_wire(&self) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind,
            message: self.message.clone(),
        }
    }
}

impl std::fmt::Display for IceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for IceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<icecore_workflow::BlueprintShapeError> for IceError {
    fn from(err: icecore_workflow::BlueprintShapeError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<icecore_workflow::GraphError> for IceError {
    fn from(err: icecore_workflow::GraphError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<serde_json::Error> for IceError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<icecore_registry::RegistryError> for IceError {
    fn from(err: icecore_registry::RegistryError) -> Self {
        use icecore_registry::RegistryError as E;
        let kind = match &err {
            E::NotFound { .. } => IceErrorKind::NotFound,
            E::VersionMismatch { .. } => IceErrorKind::VersionMismatch,
            E::AlreadyExists { .. } | E::Validation { .. } => IceErrorKind::Validation,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<icecore_store::StoreError> for IceError {
    fn from(err: icecore_store::StoreError) -> Self {
        use icecore_store::StoreError as E;
        let kind = match &err {
            E::NotFound { .. } => IceErrorKind::NotFound,
            E::VersionMismatch { .. } => IceErrorKind::VersionMismatch,
            E::Validation { .. } => IceErrorKind::Validation,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<icecore_compiler::CompileError> for IceError {
    fn from(err: icecore_compiler::CompileError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<icecore_executors::ExecutorError> for IceError {
    fn from(err: icecore_executors::ExecutorError) -> Self {
        use icecore_executors::ExecutorError as E;
        let kind = match &err {
            E::Retryable { .. } => IceErrorKind::ToolExecution,
            E::Fatal { .. } => IceErrorKind::Internal,
            E::Validation(_) | E::SandboxViolation { .. } => IceErrorKind::Validation,
            E::Cancelled => IceErrorKind::Cancelled,
            E::DataLimitExceeded { .. } => IceErrorKind::BudgetExceeded,
            E::CodeResourceExceeded(_) => IceErrorKind::CodeResourceExceeded,
            E::AgentExhausted { .. } => IceErrorKind::AgentExhausted,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = IceError::not_found("run abc123");
        assert_eq!(err.to_string(), "not_found: run abc123");
    }

    #[test]
    fn kind_transience_classification() {
        assert!(IceErrorKind::Timeout.is_transient());
        assert!(IceErrorKind::ToolExecution.is_transient());
        assert!(IceErrorKind::LLMProvider.is_transient());
        assert!(!IceErrorKind::Validation.is_transient());
        assert!(!IceErrorKind::Cancelled.is_transient());
    }

    #[test]
    fn to_wire_drops_source_chain() {
        let err = IceError::internal("boom").with_source(std::io::Error::other("disk full"));
        let wire = err.to_wire();
        assert_eq!(wire.kind, IceErrorKind::Internal);
        assert_eq!(wire.message, "boom");
    }

    #[test]
    fn wire_serde_roundtrip() {
        let wire = ErrorInfo {
            kind: IceErrorKind::BudgetExceeded,
            message: "org budget exceeded".into(),
        };
        let json = serde_json::to_string(&wire).unwrap();
        let back: ErrorInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(wire, back);
    }

    #[test]
    fn kind_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&IceErrorKind::RegistryBindingMissing).unwrap(),
            "\"registry_binding_missing\""
        );
    }

    #[test]
    fn from_blueprint_shape_error_is_validation() {
        let err: IceError = icecore_workflow::BlueprintShapeError::Empty.into();
        assert_eq!(err.kind, IceErrorKind::Validation);
    }

    #[test]
    fn from_executor_error_retryable_is_tool_execution() {
        let err: IceError = icecore_executors::ExecutorError::retryable("timeout").into();
        assert_eq!(err.kind, IceErrorKind::ToolExecution);
    }

    #[test]
    fn from_executor_error_agent_exhausted_maps_kind() {
        let err: IceError =
            icecore_executors::ExecutorError::AgentExhausted { iterations: 5 }.into();
        assert_eq!(err.kind, IceErrorKind::AgentExhausted);
    }

    #[test]
    fn from_registry_error_not_found_maps_kind() {
        let err: IceError = icecore_registry::RegistryError::NotFound {
            kind: icecore_registry::RegistryKind::Tool,
            name: "http.get".into(),
        }
        .into();
        assert_eq!(err.kind, IceErrorKind::NotFound);
    }

    #[test]
    fn from_store_error_version_mismatch_maps_kind() {
        let err: IceError = icecore_store::StoreError::VersionMismatch {
            id: "bp-1".into(),
            expected: 2,
            supplied: 1,
        }
        .into();
        assert_eq!(err.kind, IceErrorKind::VersionMismatch);
    }

    #[test]
    fn from_compile_error_is_validation() {
        let err: IceError = icecore_compiler::CompileError::Validation(vec![]).into();
        assert_eq!(err.kind, IceErrorKind::Validation);
    }
}
