//! # icecore-core
//!
//! Core types shared across every icecore crate: strongly-typed identifiers,
//! the interface-version newtype used by the registry, and the crate-wide
//! error enum returned by identifier parsing and other primitive operations.
//!
//! Higher-level crates (`icecore-workflow`, `icecore-execution`,
//! `icecore-scheduler`, ...) build their own domain types on top of this
//! crate; it intentionally carries no business logic of its own.

#![forbid(unsafe_code)]

pub mod id;
pub mod version;

mod error;

pub use error::CoreError;
pub use id::{AttemptId, BlueprintId, NodeId, RegistryEntryId, RunId, UuidParseError};
pub use version::InterfaceVersion;

/// Result type used throughout icecore crates.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Convenience re-exports for downstream crates.
pub mod prelude {
    pub use super::{
        AttemptId, BlueprintId, CoreError, InterfaceVersion, NodeId, RegistryEntryId, Result,
        RunId, UuidParseError,
    };
}
