//! # Broadcast bus for runtime events.
//!
//! Thin wrapper around [`tokio::sync::broadcast`]. Workers publish without
//! blocking; each subscriber gets an independent receiver. Slow receivers
//! observe `RecvError::Lagged(n)` and skip the `n` oldest events — the bus
//! never applies backpressure to a worker.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; all clones publish into the same ring buffer. Events sent
/// while no receiver exists are dropped.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given ring-buffer capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; never blocks.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
