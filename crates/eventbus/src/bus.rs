//! `EventBus` — one append-only, monotonically-sequenced stream per run
//! (§4.7). Grounded on `nebula-telemetry::EventBus`
//! broadcast-channel shape, generalized from one global channel to one
//! channel per `run_id` with a durable replay buffer trimmed by a retention
//! window, since spec.md §4.7 requires "durable replay within a configured
//! retention window" that a single ungated broadcast channel can't provide.

use std::collections::VecDeque;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use icecore_core::RunId;
use tokio::sync::broadcast;

use crate::event::{EventKind, EventRecord};

struct RunStream {
    next_seq: u64,
    buffer: VecDeque<EventRecord>,
    sender: broadcast::Sender<EventRecord>,
}

impl RunStream {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            next_seq: 0,
            buffer: VecDeque::new(),
            sender,
        }
    }

    fn trim_expired(&mut self, retention: ChronoDuration, now: DateTime<Utc>) {
        while let Some(front) = self.buffer.front() {
            if now - front.at > retention {
                self.buffer.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-run append-only event stream. Writers are the Scheduler and node
/// executors' emit points; readers subscribe by `run_id` and an optional
/// `since_seq` for resuming a prior subscription.
pub struct EventBus {
    streams: DashMap<RunId, RunStream>,
    channel_capacity: usize,
    retention: ChronoDuration,
}

impl EventBus {
    /// `channel_capacity` bounds the live broadcast channel per run (a slow
    /// subscriber that falls behind this many events sees a `Lagged` gap,
    /// transparently skipped by `EventSubscriber::recv`); `retention` bounds
    /// how long emitted events stay in the durable replay buffer.
    #[must_use]
    pub fn new(channel_capacity: usize, retention: StdDuration) -> Self {
        Self {
            streams: DashMap::new(),
            channel_capacity,
            retention: ChronoDuration::from_std(retention).unwrap_or(ChronoDuration::zero()),
        }
    }

    /// Appends `kind` to `run_id`'s stream, assigning the next sequence
    /// number, and broadcasts it to any live subscribers. Returns the
    /// stamped record.
    pub fn emit(&self, run_id: RunId, kind: EventKind) -> EventRecord {
        let now = Utc::now();
        let mut stream = self
            .streams
            .entry(run_id)
            .or_insert_with(|| RunStream::new(self.channel_capacity));

        let seq = stream.next_seq;
        stream.next_seq += 1;
        let record = EventRecord { run_id, seq, at: now, kind };

        stream.buffer.push_back(record.clone());
        stream.trim_expired(self.retention, now);
        let _ = stream.sender.send(record.clone());
        record
    }

    /// Subscribes to `run_id`'s stream. Returns every buffered record with
    /// `seq > since_seq` (0 if `None`) as `replay`, plus a live
    /// `EventSubscriber` for everything emitted from this call onward —
    /// the two never overlap, since the replay snapshot and the broadcast
    /// subscription are taken under the same per-run lock.
    #[must_use]
    pub fn subscribe(&self, run_id: RunId, since_seq: Option<u64>) -> Subscription {
        let floor = since_seq.unwrap_or(0);
        let mut stream = self
            .streams
            .entry(run_id)
            .or_insert_with(|| RunStream::new(self.channel_capacity));

        let replay = stream
            .buffer
            .iter()
            .filter(|r| r.seq > floor)
            .cloned()
            .collect();
        let live = EventSubscriber {
            receiver: stream.sender.subscribe(),
        };
        Subscription { replay, live }
    }

    /// Number of records currently retained in `run_id`'s replay buffer.
    #[must_use]
    pub fn buffered_len(&self, run_id: RunId) -> usize {
        self.streams.get(&run_id).map_or(0, |s| s.buffer.len())
    }
}

/// The result of subscribing: a durable catch-up batch plus a handle for
/// everything delivered from the moment of subscription onward.
pub struct Subscription {
    pub replay: Vec<EventRecord>,
    pub live: EventSubscriber,
}

/// A live handle on a run's stream. Delivery is at-least-once: a lagging
/// subscriber transparently skips the events it missed rather than erroring.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventRecord>,
}

impl EventSubscriber {
    /// Waits for the next event. Returns `None` once the bus-side sender
    /// (and every stream it backs) has been dropped.
    pub async fn recv(&mut self) -> Option<EventRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for the next event.
    pub fn try_recv(&mut self) -> Option<EventRecord> {
        loop {
            match self.receiver.try_recv() {
                Ok(record) => return Some(record),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
