//! # Exponential backoff between relaunch attempts.
//!
//! [`BackoffPolicy`] is a pure function of the attempt number: the delay for
//! attempt `n` (0-indexed) is `base * 2^n`, clamped to `max`. It never feeds
//! a previous delay back into the next computation, so jitter (when enabled)
//! cannot make delays drift over time.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::default(); // base=2s, max=60s
//! assert_eq!(backoff.delay(0), Duration::from_secs(2));
//! assert_eq!(backoff.delay(1), Duration::from_secs(4));
//! assert_eq!(backoff.delay(5), Duration::from_secs(60)); // 64s clamped
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Exponential backoff policy with a hard cap.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first relaunch (attempt 0).
    pub base: Duration,
    /// Maximum delay; growth is clamped here.
    pub max: Duration,
    /// Optional randomization of the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `base = 2s`, `max = 60s`, no jitter.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max: Duration::from_secs(60),
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// Returns `min(base * 2^attempt, max)` with the jitter policy applied
    /// to the clamped value. Overflow at high attempt counts clamps to `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let grown = self.base.checked_mul(factor).unwrap_or(self.max);
        self.jitter.apply(grown.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_secs: u64, max_secs: u64) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_secs(base_secs),
            max: Duration::from_secs(max_secs),
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn attempt_zero_returns_base() {
        assert_eq!(policy(2, 60).delay(0), Duration::from_secs(2));
    }

    #[test]
    fn doubles_each_attempt() {
        let p = policy(2, 60);
        assert_eq!(p.delay(1), Duration::from_secs(4));
        assert_eq!(p.delay(2), Duration::from_secs(8));
        assert_eq!(p.delay(3), Duration::from_secs(16));
        assert_eq!(p.delay(4), Duration::from_secs(32));
    }

    #[test]
    fn clamps_to_max() {
        // 2 * 2^5 = 64s, above the 60s cap.
        assert_eq!(policy(2, 60).delay(5), Duration::from_secs(60));
    }

    #[test]
    fn huge_attempt_clamps_to_max() {
        assert_eq!(policy(2, 60).delay(100), Duration::from_secs(60));
        assert_eq!(policy(2, 60).delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn base_above_max_is_clamped() {
        assert_eq!(policy(90, 60).delay(0), Duration::from_secs(60));
    }

    #[test]
    fn full_jitter_stays_within_bounds() {
        let p = BackoffPolicy {
            base: Duration::from_secs(2),
            max: Duration::from_secs(60),
            jitter: JitterPolicy::Full,
        };
        for attempt in 0..10 {
            let cap = Duration::from_secs(2)
                .checked_mul(1 << attempt)
                .unwrap()
                .min(Duration::from_secs(60));
            assert!(p.delay(attempt) <= cap, "attempt {attempt}");
        }
    }
}
