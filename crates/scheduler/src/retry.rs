//! Exponential backoff with full jitter for node retries (§4.4's
//! `retry_policy`). Upstream's `engine.rs` has no retry loop at all — a
//! node either runs once and succeeds or fails the level outright — so this
//! module has no upstream counterpart; it is grounded directly in
//! [`icecore_workflow::RetryPolicy`]'s documented contract ("exponential
//! with full jitter, bounded by `backoff_max_ms`").

use icecore_workflow::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Computes the delay before retrying a node's `attempt`'th failed attempt
/// (0-indexed: the delay before the *second* attempt uses `attempt = 0`).
#[must_use]
pub fn backoff_for(policy: RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.min(32);
    let scaled = policy.backoff_base_ms.saturating_mul(1u64 << exponent);
    let capped = scaled.min(policy.backoff_max_ms);

    let millis = if policy.jitter && capped > 0 {
        rand::rng().random_range(0..=capped)
    } else {
        capped
    };

    Duration::from_millis(millis)
}
