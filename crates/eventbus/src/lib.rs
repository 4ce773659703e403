//! icecore-eventbus
//!
//! The append-only per-run event stream (§4.7): writers are executor-
//! internal emit points, readers subscribe by `run_id` and an optional
//! `since_seq`. At-least-once delivery to live subscribers, durable replay
//! within a configured retention window — see [`EventBus`].
//!
//! No generic metrics registry lives here: `tracing` is the ambient
//! observability layer for icecore (see `icecore-runtime`'s subscriber
//! setup), so the upstream separate `Counter`/`Gauge`/`Histogram`
//! primitives have no counterpart in this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bus;
mod event;

pub use bus::{EventBus, EventSubscriber, Subscription};
pub use event::{EventKind, EventRecord};

/// Convenience re-exports for consumers of this crate.
pub mod prelude {
    pub use crate::{EventBus, EventKind, EventRecord, EventSubscriber, Subscription};
}
