/// Failure kinds for Blueprint Store operations, matching `spec.md` §4.2.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("no record found for id {id}")]
    NotFound {
        /// String form of the id that was looked up.
        id: String,
    },

    /// The supplied version-lock did not match the stored version, or a
    /// create used the `__new__` sentinel against an id that already exists.
    #[error("version mismatch for id {id}: expected {expected}, supplied {supplied}")]
    VersionMismatch {
        /// String form of the id involved.
        id: String,
        /// The version currently stored.
        expected: u64,
        /// The version the caller supplied (`0` stands in for the `__new__`
        /// sentinel when the record already existed).
        supplied: u64,
    },

    /// The write would violate a structural invariant (shape checks,
    /// `finalize` validation).
    #[error("validation failed for id {id}: {detail}")]
    Validation {
        /// String form of the id involved.
        id: String,
        /// Human-readable validation failure detail.
        detail: String,
    },
}
