use chrono::{DateTime, Utc};
use icecore_core::RegistryEntryId;
use serde::{Deserialize, Serialize};

/// Node kinds that resolve through the Registry. The other five kinds
/// (`llm`, `condition`, `loop`, `parallel`, `recursive`) are built-in control
/// flow or dispatch directly to a provider configured at the runtime level —
/// they have no Registry binding, per `spec.md` §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// A tool factory.
    Tool,
    /// An agent's tool-calling backend.
    Agent,
    /// A sub-workflow blueprint reference.
    Workflow,
    /// A sandboxed code factory.
    Code,
}

/// A single registered binding: `(kind, name)` resolved to a definition
/// describing how to construct or invoke the bound executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Unique identifier for this entry, stable across updates.
    pub id: RegistryEntryId,
    /// The kind of binding.
    pub kind: RegistryKind,
    /// Name this binding is looked up by, unique within its kind.
    pub name: String,
    /// Optimistic-concurrency version, incremented on every `update`.
    pub version: u64,
    /// Factory/schema definition. Opaque JSON at this layer — the Scheduler
    /// and `icecore-executors` interpret it according to `kind`.
    pub definition: serde_json::Value,
    /// When this entry was first registered.
    pub created_at: DateTime<Utc>,
    /// When this entry was last updated.
    pub updated_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub(crate) fn new(
        kind: RegistryKind,
        name: String,
        definition: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RegistryEntryId::v4(),
            kind,
            name,
            version: 1,
            definition,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn bump(&self, definition: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            name: self.name.clone(),
            version: self.version + 1,
            definition,
            created_at: self.created_at,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_starts_at_version_one() {
        let entry = RegistryEntry::new(RegistryKind::Tool, "http".into(), serde_json::json!({}), Utc::now());
        assert_eq!(entry.version, 1);
    }

    #[test]
    fn bump_preserves_id_and_created_at_increments_version() {
        let created = Utc::now();
        let entry = RegistryEntry::new(RegistryKind::Tool, "http".into(), serde_json::json!({}), created);
        let updated = entry.bump(serde_json::json!({"v": 2}), created + chrono::Duration::seconds(1));
        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.created_at, entry.created_at);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.definition, serde_json::json!({"v": 2}));
    }
}
