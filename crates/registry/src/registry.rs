use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::entry::{RegistryEntry, RegistryKind};
use crate::error::RegistryError;
use crate::manifest::Manifest;

type Key = (RegistryKind, String);

/// Process-wide directory resolving `(kind, name)` to an executable binding.
///
/// Backed by `RwLock<HashMap<Key, Arc<RegistryEntry>>>` with copy-on-write
/// updates: a write swaps in a new `Arc<RegistryEntry>` rather than mutating
/// one in place, so a reader holding a clone from before the swap keeps
/// observing a consistent, unchanged entry (per the Design Note in §9 on
/// registry-as-explicit-value — updates never tear a reader's view).
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<Key, Arc<RegistryEntry>>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated from a startup manifest.
    ///
    /// # Errors
    ///
    /// Returns the first `RegistryError` hit while replaying the manifest.
    /// Manifest entries are expected to be unique; a duplicate `(kind, name)`
    /// in the manifest itself is an `AlreadyExists` error.
    pub fn from_manifest(manifest: Manifest) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for entry in manifest.entries {
            registry.register(entry.kind, entry.name, entry.definition, None)?;
        }
        Ok(registry)
    }

    /// Register a binding.
    ///
    /// `version_lock` is `None` to create a brand-new binding. If the
    /// `(kind, name)` already exists, `version_lock` must be `Some` and equal
    /// the stored version, in which case this call behaves like `update`;
    /// otherwise it fails with `AlreadyExists`.
    pub fn register(
        &self,
        kind: RegistryKind,
        name: impl Into<String>,
        definition: serde_json::Value,
        version_lock: Option<u64>,
    ) -> Result<RegistryEntry, RegistryError> {
        let name = name.into();
        let key = (kind, name.clone());
        let mut entries = self.entries.write();

        match entries.get(&key) {
            None => {
                let entry = RegistryEntry::new(kind, name, definition, Utc::now());
                entries.insert(key, Arc::new(entry.clone()));
                Ok(entry)
            }
            Some(existing) => match version_lock {
                None => Err(RegistryError::AlreadyExists { kind, name }),
                Some(lock) if lock != existing.version => Err(RegistryError::VersionMismatch {
                    kind,
                    name,
                    expected: existing.version,
                    supplied: lock,
                }),
                Some(_) => {
                    let updated = existing.bump(definition, Utc::now());
                    entries.insert(key, Arc::new(updated.clone()));
                    Ok(updated)
                }
            },
        }
    }

    /// Look up a binding by kind and name.
    pub fn get(&self, kind: RegistryKind, name: &str) -> Result<Arc<RegistryEntry>, RegistryError> {
        self.entries
            .read()
            .get(&(kind, name.to_owned()))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                name: name.to_owned(),
            })
    }

    /// List all entries, optionally filtered by kind.
    #[must_use]
    pub fn list(&self, filter: Option<RegistryKind>) -> Vec<Arc<RegistryEntry>> {
        self.entries
            .read()
            .values()
            .filter(|entry| filter.is_none_or(|k| k == entry.kind))
            .cloned()
            .collect()
    }

    /// Update an existing binding under optimistic concurrency.
    pub fn update(
        &self,
        kind: RegistryKind,
        name: &str,
        definition: serde_json::Value,
        version_lock: u64,
    ) -> Result<RegistryEntry, RegistryError> {
        let key = (kind, name.to_owned());
        let mut entries = self.entries.write();
        let existing = entries.get(&key).ok_or_else(|| RegistryError::NotFound {
            kind,
            name: name.to_owned(),
        })?;

        if existing.version != version_lock {
            return Err(RegistryError::VersionMismatch {
                kind,
                name: name.to_owned(),
                expected: existing.version,
                supplied: version_lock,
            });
        }

        let updated = existing.bump(definition, Utc::now());
        entries.insert(key, Arc::new(updated.clone()));
        Ok(updated)
    }

    /// Delete a binding.
    pub fn delete(&self, kind: RegistryKind, name: &str) -> Result<(), RegistryError> {
        let key = (kind, name.to_owned());
        self.entries
            .write()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                name: name.to_owned(),
            })
    }

    /// Number of registered bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no bindings are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def() -> serde_json::Value {
        serde_json::json!({"factory": "builtin::http"})
    }

    #[test]
    fn register_and_get() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();

        let entry = registry.get(RegistryKind::Tool, "http").unwrap();
        assert_eq!(entry.name, "http");
        assert_eq!(entry.version, 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let registry = Registry::new();
        let err = registry.get(RegistryKind::Tool, "missing").unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotFound {
                kind: RegistryKind::Tool,
                name: "missing".into(),
            }
        );
    }

    #[test]
    fn register_duplicate_without_lock_fails() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        let err = registry.register(RegistryKind::Tool, "http", def(), None).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists { .. }));
    }

    #[test]
    fn register_with_matching_lock_updates() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        let updated = registry
            .register(RegistryKind::Tool, "http", serde_json::json!({"v": 2}), Some(1))
            .unwrap();
        assert_eq!(updated.version, 2);
    }

    #[test]
    fn register_with_stale_lock_fails() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        let err = registry
            .register(RegistryKind::Tool, "http", def(), Some(99))
            .unwrap_err();
        assert!(matches!(err, RegistryError::VersionMismatch { .. }));
    }

    #[test]
    fn update_bumps_version_and_preserves_id() {
        let registry = Registry::new();
        let created = registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        let updated = registry
            .update(RegistryKind::Tool, "http", serde_json::json!({"v": 2}), 1)
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.version, 2);
    }

    #[test]
    fn update_missing_is_not_found() {
        let registry = Registry::new();
        let err = registry
            .update(RegistryKind::Tool, "missing", def(), 1)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn update_with_stale_version_fails() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        let err = registry
            .update(RegistryKind::Tool, "http", def(), 5)
            .unwrap_err();
        assert!(matches!(err, RegistryError::VersionMismatch { .. }));
    }

    #[test]
    fn delete_removes_entry() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        registry.delete(RegistryKind::Tool, "http").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let registry = Registry::new();
        let err = registry.delete(RegistryKind::Tool, "missing").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn list_filters_by_kind() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        registry.register(RegistryKind::Agent, "researcher", def(), None).unwrap();

        let tools = registry.list(Some(RegistryKind::Tool));
        assert_eq!(tools.len(), 1);
        assert_eq!(registry.list(None).len(), 2);
    }

    #[test]
    fn same_name_different_kind_does_not_collide() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "runner", def(), None).unwrap();
        registry.register(RegistryKind::Code, "runner", def(), None).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn from_manifest_preloads_entries() {
        let manifest = Manifest {
            entries: vec![crate::manifest::ManifestEntry {
                kind: RegistryKind::Tool,
                name: "http.request".into(),
                definition: def(),
            }],
        };
        let registry = Registry::from_manifest(manifest).unwrap();
        assert!(registry.get(RegistryKind::Tool, "http.request").is_ok());
    }

    #[test]
    fn concurrent_update_does_not_tear_a_prior_reader() {
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "http", def(), None).unwrap();
        let observed = registry.get(RegistryKind::Tool, "http").unwrap();
        registry
            .update(RegistryKind::Tool, "http", serde_json::json!({"v": 2}), 1)
            .unwrap();
        assert_eq!(observed.version, 1);
        let latest = registry.get(RegistryKind::Tool, "http").unwrap();
        assert_eq!(latest.version, 2);
    }
}
