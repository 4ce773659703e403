//! Unique identifiers for icecore entities.
//!
//! Strongly-typed UUID identifiers built on [`domain-key`](https://crates.io/crates/domain-key)
//! `Uuid<D>` wrappers. Each identifier type is parameterized by a unique domain
//! marker, giving compile-time type safety that prevents mixing different ID
//! types (a `NodeId` can never be passed where a `RunId` is expected).
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as a UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Entity identifiers — UUID-based, Copy, 16 bytes each
define_uuid!(BlueprintIdDomain => BlueprintId);
define_uuid!(RunIdDomain => RunId);
define_uuid!(NodeIdDomain => NodeId);
define_uuid!(RegistryEntryIdDomain => RegistryEntryId);
define_uuid!(AttemptIdDomain => AttemptId);
