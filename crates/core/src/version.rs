//! Interface versioning for registry bindings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A `(major, minor)` interface version.
///
/// Registry bindings are versioned so that a blueprint can pin the exact
/// binding it was authored against; a major bump signals an incompatible
/// input/output schema change, a minor bump signals an additive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterfaceVersion {
    /// Incremented on a breaking schema change.
    pub major: u32,
    /// Incremented on an additive, backward-compatible change.
    pub minor: u32,
}

impl InterfaceVersion {
    /// Construct a version from its components.
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if `other` can be substituted for `self` without
    /// breaking a caller (same major, minor at least as new).
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.major == other.major && other.minor >= self.minor
    }
}

impl Default for InterfaceVersion {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl fmt::Display for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_one_zero() {
        assert_eq!(InterfaceVersion::default(), InterfaceVersion::new(1, 0));
    }

    #[test]
    fn compatible_same_major_newer_minor() {
        let required = InterfaceVersion::new(1, 0);
        let provided = InterfaceVersion::new(1, 2);
        assert!(required.is_compatible_with(&provided));
    }

    #[test]
    fn incompatible_different_major() {
        let required = InterfaceVersion::new(1, 0);
        let provided = InterfaceVersion::new(2, 0);
        assert!(!required.is_compatible_with(&provided));
    }

    #[test]
    fn incompatible_older_minor() {
        let required = InterfaceVersion::new(1, 3);
        let provided = InterfaceVersion::new(1, 1);
        assert!(!required.is_compatible_with(&provided));
    }

    #[test]
    fn display_format() {
        assert_eq!(InterfaceVersion::new(2, 5).to_string(), "2.5");
    }
}
