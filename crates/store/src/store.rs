use dashmap::DashMap;
use icecore_core::BlueprintId;
use icecore_workflow::{Blueprint, BlueprintShapeError, PartialBlueprint};

use crate::error::StoreError;
use crate::patch::BlueprintPatch;
use crate::record::{VersionLock, VersionedRecord};

/// Durable CRUD for `PartialBlueprint` drafts and finalized `Blueprint`s,
/// with optimistic concurrency via a `version_lock` returned on every read
/// and required on every write — the `__new__` sentinel (`None`) denotes
/// "create".
///
/// Blueprints are immutable once finalized: `update`/`put`/`patch` here
/// produce a *new version* of the same id's record, they do not mutate any
/// already-running Run's view. A Run snapshots its `Plan` at start and never
/// re-reads the Blueprint record, so a later update can never make an
/// in-flight Run's `plan_fingerprint` stale (Design Note, `spec.md` §4.2).
#[derive(Default)]
pub struct BlueprintStore {
    drafts: DashMap<BlueprintId, VersionedRecord<PartialBlueprint>>,
    blueprints: DashMap<BlueprintId, VersionedRecord<Blueprint>>,
}

impl BlueprintStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Blueprint (finalized, immutable) ----------------------------

    /// Create a new finalized blueprint record. Equivalent to `put` with the
    /// `__new__` sentinel.
    pub fn create(&self, blueprint: Blueprint) -> Result<u64, StoreError> {
        self.put(blueprint.id, blueprint, None)
    }

    /// Read a blueprint and its current version.
    pub fn get(&self, id: BlueprintId) -> Result<(Blueprint, u64), StoreError> {
        self.blueprints
            .get(&id)
            .map(|r| (r.value.clone(), r.version))
            .ok_or_else(|| not_found(id))
    }

    /// Full replace under optimistic concurrency. `version_lock` of `None`
    /// creates; `Some(v)` must match the stored version.
    pub fn put(
        &self,
        id: BlueprintId,
        blueprint: Blueprint,
        version_lock: VersionLock,
    ) -> Result<u64, StoreError> {
        match self.blueprints.get(&id) {
            None => match version_lock {
                Some(supplied) => Err(StoreError::VersionMismatch {
                    id: id.to_string(),
                    expected: 0,
                    supplied,
                }),
                None => {
                    let record = VersionedRecord::new(blueprint);
                    let version = record.version;
                    self.blueprints.insert(id, record);
                    Ok(version)
                }
            },
            Some(existing) => {
                if version_lock != Some(existing.version) {
                    return Err(StoreError::VersionMismatch {
                        id: id.to_string(),
                        expected: existing.version,
                        supplied: version_lock.unwrap_or(0),
                    });
                }
                let record = existing.bump(blueprint);
                let version = record.version;
                drop(existing);
                self.blueprints.insert(id, record);
                Ok(version)
            }
        }
    }

    /// Convenience wrapper over `put` for the common "I have the current
    /// version" case.
    pub fn update(
        &self,
        id: BlueprintId,
        blueprint: Blueprint,
        version_lock: u64,
    ) -> Result<u64, StoreError> {
        self.put(id, blueprint, Some(version_lock))
    }

    /// Shallow-merge a patch into the stored blueprint: `metadata` replaces
    /// wholesale if present, `nodes` replaces wholesale if present — per
    /// `spec.md` §4.2's "replace at the `nodes` level" patch semantics.
    pub fn patch(
        &self,
        id: BlueprintId,
        patch: BlueprintPatch,
        version_lock: u64,
    ) -> Result<u64, StoreError> {
        let existing = self.blueprints.get(&id).ok_or_else(|| not_found(id))?;
        if existing.version != version_lock {
            return Err(StoreError::VersionMismatch {
                id: id.to_string(),
                expected: existing.version,
                supplied: version_lock,
            });
        }
        let patched = patch.apply(&existing.value);
        let record = existing.bump(patched);
        let version = record.version;
        drop(existing);
        self.blueprints.insert(id, record);
        Ok(version)
    }

    /// Delete a finalized blueprint record.
    pub fn delete(&self, id: BlueprintId) -> Result<(), StoreError> {
        self.blueprints
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    /// List every finalized blueprint with its current version.
    #[must_use]
    pub fn list(&self) -> Vec<(Blueprint, u64)> {
        self.blueprints
            .iter()
            .map(|r| (r.value.clone(), r.version))
            .collect()
    }

    // ---- PartialBlueprint (mutable drafts) ----------------------------

    /// Create a new draft record.
    pub fn create_draft(&self, draft: PartialBlueprint) -> Result<u64, StoreError> {
        let id = draft.id;
        if self.drafts.contains_key(&id) {
            let existing_version = self.drafts.get(&id).map(|r| r.version).unwrap_or_default();
            return Err(StoreError::VersionMismatch {
                id: id.to_string(),
                expected: existing_version,
                supplied: 0,
            });
        }
        let record = VersionedRecord::new(draft);
        let version = record.version;
        self.drafts.insert(id, record);
        Ok(version)
    }

    /// Read a draft and its current version.
    pub fn get_draft(&self, id: BlueprintId) -> Result<(PartialBlueprint, u64), StoreError> {
        self.drafts
            .get(&id)
            .map(|r| (r.value.clone(), r.version))
            .ok_or_else(|| not_found(id))
    }

    /// Apply an arbitrary in-place edit to a draft under optimistic
    /// concurrency (`spec.md` §4.2's `mutate` operation).
    pub fn mutate_draft(
        &self,
        id: BlueprintId,
        version_lock: u64,
        edit: impl FnOnce(&mut PartialBlueprint),
    ) -> Result<u64, StoreError> {
        let existing = self.drafts.get(&id).ok_or_else(|| not_found(id))?;
        if existing.version != version_lock {
            return Err(StoreError::VersionMismatch {
                id: id.to_string(),
                expected: existing.version,
                supplied: version_lock,
            });
        }
        let mut draft = existing.value.clone();
        drop(existing);
        edit(&mut draft);
        let record = self
            .drafts
            .get(&id)
            .ok_or_else(|| not_found(id))?
            .bump(draft);
        let version = record.version;
        self.drafts.insert(id, record);
        Ok(version)
    }

    /// Return the draft's recorded open questions as next-step suggestions.
    ///
    /// This does not generate new suggestions — a natural-language design
    /// assistant is out of scope here — it surfaces whatever the draft's
    /// author (or an external tool) already recorded in `open_questions`.
    pub fn suggest_next(&self, id: BlueprintId) -> Result<Vec<String>, StoreError> {
        self.drafts
            .get(&id)
            .map(|r| r.value.open_questions.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Validate and persist a draft as a new, immutable `Blueprint` under a
    /// fresh id, per `spec.md` §4.2: "`finalize` validates and on success
    /// persists a new immutable Blueprint with a fresh id."
    pub fn finalize_draft(
        &self,
        id: BlueprintId,
        version_lock: u64,
        new_id: BlueprintId,
    ) -> Result<(Blueprint, u64), StoreError> {
        let existing = self.drafts.get(&id).ok_or_else(|| not_found(id))?;
        if existing.version != version_lock {
            return Err(StoreError::VersionMismatch {
                id: id.to_string(),
                expected: existing.version,
                supplied: version_lock,
            });
        }
        let draft = existing.value.clone();
        drop(existing);

        let mut finalized = draft
            .finalize()
            .map_err(|e: BlueprintShapeError| StoreError::Validation {
                id: id.to_string(),
                detail: e.to_string(),
            })?;
        finalized.id = new_id;

        let version = self.create(finalized.clone())?;
        Ok((finalized, version))
    }

    /// Delete a draft record.
    pub fn delete_draft(&self, id: BlueprintId) -> Result<(), StoreError> {
        self.drafts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: BlueprintId) -> StoreError {
    StoreError::NotFound { id: id.to_string() }
}
