//! The `Run` data model from §3: `{run_id, blueprint_id?, plan_fingerprint,
//! status, started_at, finished_at?, result?, error?, cost_so_far,
//! cancel_requested}`. Distinct from [`icecore_execution::RunState`], which
//! tracks per-node execution state for the Scheduler; this is the coarser,
//! externally-visible snapshot the Run Controller persists and a caller
//! polls or lists. Backed by a `DashMap`, the same in-process
//! single-backend choice `icecore-store` makes for Blueprints (§1
//! "distributed execution across multiple orchestrator processes" is a
//! Non-goal, so there is no cross-process durability story to build here).

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use icecore_core::{BlueprintId, RunId};
use icecore_execution::{ErrorInfo, RunStatus};
use serde::{Deserialize, Serialize};

/// A deterministic fingerprint of the `(Blueprint, Registry)` pair a Plan
/// was compiled from (§9 design note: "the same pair yields the same
/// `plan_fingerprint`"). Computed from the blueprint's id and version, which
/// together identify an immutable artifact — recompiling the same version
/// against an unchanged registry always reproduces the same `Plan` shape.
#[must_use]
pub fn plan_fingerprint(blueprint_id: BlueprintId, blueprint_version: u64) -> String {
    format!("{blueprint_id}@v{blueprint_version}")
}

/// The externally-visible snapshot of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub blueprint_id: Option<BlueprintId>,
    pub plan_fingerprint: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<ErrorInfo>,
    pub cost_so_far: f64,
    pub cancel_requested: bool,
}

impl RunRecord {
    #[must_use]
    pub fn pending(run_id: RunId, blueprint_id: Option<BlueprintId>, plan_fingerprint: String) -> Self {
        Self {
            run_id,
            blueprint_id,
            plan_fingerprint,
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            cost_so_far: 0.0,
            cancel_requested: false,
        }
    }
}

/// In-process table of every run's latest snapshot, keyed by `run_id`.
/// Entries older than the configured retention window are swept on
/// [`RunTable::sweep_expired`], mirroring `icecore-eventbus`'s own
/// retention-trimming so a run's coarse status and its event history expire
/// together.
#[derive(Default)]
pub struct RunTable {
    runs: DashMap<RunId, RunRecord>,
}

impl RunTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: RunRecord) {
        self.runs.insert(record.run_id, record);
    }

    #[must_use]
    pub fn get(&self, run_id: RunId) -> Option<RunRecord> {
        self.runs.get(&run_id).map(|entry| entry.clone())
    }

    /// Applies `edit` to the stored record for `run_id`, if present.
    pub fn update(&self, run_id: RunId, edit: impl FnOnce(&mut RunRecord)) {
        if let Some(mut entry) = self.runs.get_mut(&run_id) {
            edit(&mut entry);
        }
    }

    pub fn request_cancel(&self, run_id: RunId) {
        self.update(run_id, |record| record.cancel_requested = true);
    }

    /// Removes every terminal run whose `finished_at` is older than
    /// `retention`. Non-terminal runs are never swept regardless of age.
    pub fn sweep_expired(&self, retention: StdDuration, now: DateTime<Utc>) {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());
        self.runs.retain(|_, record| {
            record
                .finished_at
                .is_none_or(|finished_at| now - finished_at <= retention)
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_for_same_blueprint_and_version() {
        let id = BlueprintId::v4();
        assert_eq!(plan_fingerprint(id, 3), plan_fingerprint(id, 3));
        assert_ne!(plan_fingerprint(id, 3), plan_fingerprint(id, 4));
    }

    #[test]
    fn insert_and_get_round_trip() {
        let table = RunTable::new();
        let run_id = RunId::v4();
        table.insert(RunRecord::pending(run_id, None, "fp".into()));
        assert_eq!(table.get(run_id).unwrap().status, RunStatus::Pending);
    }

    #[test]
    fn update_mutates_in_place() {
        let table = RunTable::new();
        let run_id = RunId::v4();
        table.insert(RunRecord::pending(run_id, None, "fp".into()));
        table.update(run_id, |r| r.cost_so_far = 1.5);
        assert_eq!(table.get(run_id).unwrap().cost_so_far, 1.5);
    }

    #[test]
    fn request_cancel_sets_flag() {
        let table = RunTable::new();
        let run_id = RunId::v4();
        table.insert(RunRecord::pending(run_id, None, "fp".into()));
        table.request_cancel(run_id);
        assert!(table.get(run_id).unwrap().cancel_requested);
    }

    #[test]
    fn sweep_expired_drops_old_terminal_runs_but_keeps_pending() {
        let table = RunTable::new();
        let old_run = RunId::v4();
        let fresh_run = RunId::v4();
        let pending_run = RunId::v4();

        let now = Utc::now();
        let mut old = RunRecord::pending(old_run, None, "fp".into());
        old.status = RunStatus::Succeeded;
        old.finished_at = Some(now - chrono::Duration::hours(2));
        table.insert(old);

        let mut fresh = RunRecord::pending(fresh_run, None, "fp".into());
        fresh.status = RunStatus::Succeeded;
        fresh.finished_at = Some(now);
        table.insert(fresh);

        table.insert(RunRecord::pending(pending_run, None, "fp".into()));

        table.sweep_expired(StdDuration::from_secs(3600), now);

        assert!(table.get(old_run).is_none());
        assert!(table.get(fresh_run).is_some());
        assert!(table.get(pending_run).is_some());
    }
}
