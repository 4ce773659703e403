use crate::entry::RegistryKind;

/// Failure kinds for Registry operations, matching `spec.md` §4.1.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// `register` was called for a `(kind, name)` that already exists and no
    /// matching version-lock was supplied.
    #[error("binding already exists for {kind:?}/{name}")]
    AlreadyExists {
        /// The binding's kind.
        kind: RegistryKind,
        /// The binding's name.
        name: String,
    },

    /// `get`, `update`, or `delete` referenced a binding that does not exist.
    #[error("no binding registered for {kind:?}/{name}")]
    NotFound {
        /// The binding's kind.
        kind: RegistryKind,
        /// The binding's name.
        name: String,
    },

    /// The supplied version-lock did not match the stored version.
    #[error("version mismatch for {kind:?}/{name}: expected {expected}, supplied {supplied}")]
    VersionMismatch {
        /// The binding's kind.
        kind: RegistryKind,
        /// The binding's name.
        name: String,
        /// The version currently stored.
        expected: u64,
        /// The version the caller supplied.
        supplied: u64,
    },

    /// The definition failed schema or factory-reachability validation.
    #[error("invalid definition for {kind:?}/{name}: {detail}")]
    Validation {
        /// The binding's kind.
        kind: RegistryKind,
        /// The binding's name.
        name: String,
        /// Human-readable validation failure detail.
        detail: String,
    },
}
