use icecore_core::NodeId;
use serde::{Deserialize, Serialize};

/// One offense found while validating a [`icecore_workflow::Blueprint`].
/// `node_id` is `None` for offenses that describe the blueprint as a whole
/// rather than a single node (currently only the cycle check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOffense {
    pub node_id: Option<NodeId>,
    pub code: OffenseCode,
    pub message: String,
}

impl ValidationOffense {
    #[must_use]
    pub fn on_node(node_id: NodeId, code: OffenseCode, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id),
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn on_blueprint(code: OffenseCode, message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            code,
            message: message.into(),
        }
    }
}

/// Which of the §4.3 checks an offense came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffenseCode {
    Cycle,
    UnknownBodyEntry,
    MissingRequiredField,
    InvalidInputBinding,
    UnresolvedRegistryBinding,
}

/// Failure to compile a `Blueprint` into a `Plan`. A [`Self::Validation`]
/// always carries every offense found (collect-then-report, never the first
/// one only) — see the module doc comment for why the cycle check is the one
/// exception that short-circuits the per-node checks.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("blueprint failed validation with {} offense(s)", .0.len())]
    Validation(Vec<ValidationOffense>),
}

impl CompileError {
    #[must_use]
    pub fn offenses(&self) -> &[ValidationOffense] {
        match self {
            Self::Validation(offenses) => offenses,
        }
    }
}
