//! Runtime events and the broadcast bus that carries them.
//!
//! Workers and the supervisor publish [`Event`]s to a shared [`Bus`];
//! subscribers (logging, liveness tracking, custom sinks) consume them
//! without ever blocking the publishers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
