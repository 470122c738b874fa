//! Event subscribers.
//!
//! A [`Subscribe`] implementation consumes [`Event`](crate::events::Event)s
//! from the bus on its own dedicated listener task, so a slow sink never
//! blocks a worker. [`LogWriter`] is the built-in observability sink; it
//! renders every event through `tracing`.

mod log;
mod subscribe;

pub use self::log::LogWriter;
pub use subscribe::Subscribe;
