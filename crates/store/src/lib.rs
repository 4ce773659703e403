//! icecore-store
//!
//! Durable CRUD for the two Blueprint artifacts: `PartialBlueprint` (mutable,
//! version-locked, being designed) and `Blueprint` (immutable, validated,
//! executable). Backed by an in-memory `DashMap`-based key-value store with
//! optimistic concurrency — a production deployment would point the same
//! operations at Postgres/Redis/S3, but only the in-memory backend is in
//! scope here (distributed execution across processes is a Non-goal).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod patch;
mod record;
mod store;

pub use error::StoreError;
pub use patch::BlueprintPatch;
pub use record::VersionLock;
pub use store::BlueprintStore;

/// Convenience re-exports for consumers of this crate.
pub mod prelude {
    pub use crate::{BlueprintPatch, BlueprintStore, StoreError, VersionLock};
}
