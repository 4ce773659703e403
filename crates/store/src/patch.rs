use icecore_workflow::{Blueprint, BlueprintMetadata, NodeSpec};

/// A shallow-merge patch for a finalized `Blueprint`: `metadata` replaces
/// wholesale if present, `nodes` replaces wholesale if present, matching
/// `spec.md` §4.2's "shallow merge at the top level, replace at the `nodes`
/// level" patch semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlueprintPatch {
    /// Replacement metadata, if the patch touches it.
    pub metadata: Option<BlueprintMetadata>,
    /// Replacement node list, if the patch touches it.
    pub nodes: Option<Vec<NodeSpec>>,
}

impl BlueprintPatch {
    /// Apply this patch on top of `base`, producing a new `Blueprint` value.
    /// Does not re-run shape validation — the store re-validates via
    /// `Blueprint::new`-equivalent checks elsewhere if needed; this is a
    /// pure data transform.
    #[must_use]
    pub fn apply(&self, base: &Blueprint) -> Blueprint {
        Blueprint {
            id: base.id,
            schema_version: base.schema_version,
            version: base.version,
            metadata: self.metadata.clone().unwrap_or_else(|| base.metadata.clone()),
            nodes: self.nodes.clone().unwrap_or_else(|| base.nodes.clone()),
        }
    }
}
