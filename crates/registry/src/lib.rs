//! icecore-registry
//!
//! Process-wide directory mapping `(kind, name)` to an executable binding:
//! tool factory, agent backend, sub-workflow blueprint, or code factory.
//! Populated from a manifest at startup and mutable via [`Registry`]'s API.
//!
//! This is distinct from `icecore-executors::ExecutorRegistry`, which maps a
//! node *kind* to the Rust type that runs it. This crate tracks *what
//! bindings exist* as data (definitions, versions); that one tracks *which
//! code runs them*.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod error;
mod manifest;
mod registry;

pub use entry::{RegistryEntry, RegistryKind};
pub use error::RegistryError;
pub use manifest::{Manifest, ManifestEntry};
pub use registry::Registry;

/// Convenience re-exports for consumers of this crate.
pub mod prelude {
    pub use crate::{Manifest, ManifestEntry, Registry, RegistryEntry, RegistryError, RegistryKind};
}
