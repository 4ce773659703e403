//! Single global `tracing` subscriber, initialized once by whichever binary
//! embeds this crate (`icecore-cli`'s `main`, or a test harness). No other
//! crate in the workspace calls `tracing_subscriber::fmt::init` or installs
//! its own subscriber — `tracing`'s call sites are scattered through
//! `icecore-scheduler`/`icecore-expression`/etc., but only this function
//! decides where they go (§10.1).

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber honoring `RUST_LOG` (defaulting to `info`
/// when unset). Idempotent-safe to call more than once within a process —
/// a second call is a no-op rather than a panic, since test harnesses tend
/// to call this once per test binary, not once per test.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
