//! Idempotency key generation and deduplication — the at-least-once +
//! idempotency-key hook referenced by the non-goals (exactly-once delivery
//! itself is out of scope; this is the hook a caller uses to de-duplicate).

use std::collections::HashSet;
use std::fmt;

use icecore_core::{NodeId, RunId};
use serde::{Deserialize, Serialize};

/// A deterministic key used to de-duplicate repeated node attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    #[must_use]
    pub fn generate(run_id: RunId, node_id: NodeId, attempt: u32) -> Self {
        Self(format!("{run_id}:{node_id}:{attempt}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks which idempotency keys have been seen to prevent duplicate work.
#[derive(Debug, Default)]
pub struct IdempotencyManager {
    seen: HashSet<String>,
}

impl IdempotencyManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this is a new key (not seen before), marking it seen.
    pub fn check_and_mark(&mut self, key: &IdempotencyKey) -> bool {
        self.seen.insert(key.0.clone())
    }

    #[must_use]
    pub fn is_seen(&self, key: &IdempotencyKey) -> bool {
        self.seen.contains(&key.0)
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
