//! # Jitter applied to backoff delays.
//!
//! When many pipelines restart at once after a shared upstream outage, a
//! deterministic backoff makes them all hammer the source at the same
//! instants. [`JitterPolicy`] optionally spreads the relaunches out.
//!
//! The default is deterministic (no jitter); spreading is an opt-in knob.

use rand::Rng;
use std::time::Duration;

/// Randomization strategy for relaunch delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact computed delay (default).
    #[default]
    None,
    /// Random delay in `[0, delay]`. Maximum spreading, can relaunch early.
    Full,
    /// `delay/2 + random[0, delay/2]`. Keeps at least half the delay.
    Equal,
}

impl JitterPolicy {
    /// Applies this policy to a computed backoff delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                Duration::from_millis(rand::rng().random_range(0..=ms))
            }
            JitterPolicy::Equal => {
                let half = ms / 2;
                let spread = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + spread)
            }
        }
    }
}
