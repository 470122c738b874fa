//! Restart and backoff policies.
//!
//! These knobs control **how often** a failed pipeline is relaunched and
//! **how long** the worker waits between consecutive attempts.
//!
//! - [`BackoffPolicy`] — exponential delay growth (`base * 2^n`, clamped)
//! - [`JitterPolicy`] — optional randomization of the computed delay
//! - [`RestartLimit`] — safety valve capping the number of restarts

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartLimit;
