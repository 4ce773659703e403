use serde::{Deserialize, Serialize};

use crate::entry::RegistryKind;

/// One built-in binding loaded from the startup manifest.
///
/// Read from the path(s) in `COMPONENT_MANIFEST_PATHS` (see
/// `icecore-runtime::config`); user-registered bindings are not part of the
/// manifest — they are reloaded from the Blueprint Store's component records
/// on restart instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The binding's kind.
    pub kind: RegistryKind,
    /// Name this binding is looked up by.
    pub name: String,
    /// Factory/schema definition, opaque at this layer.
    pub definition: serde_json::Value,
}

/// A startup manifest: a flat list of built-in bindings to pre-register.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// The bindings to register, in order.
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = Manifest {
            entries: vec![ManifestEntry {
                kind: RegistryKind::Tool,
                name: "http.request".into(),
                definition: serde_json::json!({"factory": "builtin::http"}),
            }],
        };
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
    }

    #[test]
    fn empty_manifest_deserializes_from_missing_entries() {
        let manifest: Manifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.entries.is_empty());
    }
}
