//! Crate-wide error type for `icecore-core`.

use thiserror::Error;

/// Errors raised by primitive operations in `icecore-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier string failed to parse as a UUID.
    #[error("invalid identifier `{value}`: {source}")]
    InvalidId {
        /// The offending input string.
        value: String,
        /// Underlying parse failure.
        #[source]
        source: crate::id::UuidParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;

    #[test]
    fn invalid_id_error_displays_value() {
        let source = NodeId::parse("not-a-uuid").unwrap_err();
        let err = CoreError::InvalidId {
            value: "not-a-uuid".into(),
            source,
        };
        assert!(err.to_string().contains("not-a-uuid"));
    }
}
