//! # Subscriber contract.
//!
//! The extension point for plugging custom event sinks into the runtime.
//! Each subscriber is driven by its own listener task fed from a bus
//! receiver; implementations may be slow without affecting workers, though a
//! subscriber that lags more than the bus capacity skips the oldest events.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated listener task. Implementations should
/// prefer async I/O and avoid blocking the runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
