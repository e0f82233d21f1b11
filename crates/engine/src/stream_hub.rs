//! `StreamHub` — fan-out of [`Event`]s to subscribers.
//!
//! Dispatch is best-effort: a subscriber that falls too far behind the
//! broadcast channel's capacity misses the events it lagged on rather than
//! ever blocking a publisher. Ordering is per-`JobRun` FIFO because every
//! publish happens in the order the originating task worker observed its own
//! state transitions; there is no global ordering guarantee across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::state::TaskState;

/// Default channel capacity; slow subscribers beyond this lag and are
/// effectively dropped (their next `recv` returns `Lagged`).
const DEFAULT_CAPACITY: usize = 1024;

/// A single task state transition, as published to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub job: String,
    pub run: String,
    pub task: String,
    pub state: TaskState,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// In-process pub/sub hub for [`Event`]s, backed by a single broadcast
/// channel shared by every `JobRun`.
#[derive(Clone)]
pub struct StreamHub {
    sender: broadcast::Sender<Event>,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. No-op (but never blocks) if there are no
    /// subscribers.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
