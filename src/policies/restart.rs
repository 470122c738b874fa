//! # Restart budget for pipeline workers.
//!
//! Pipelines are expected to run forever, so the default budget is
//! unlimited. [`RestartLimit::AtMost`] exists as a safety valve for callers
//! that want a worker to give up after repeated failures instead of cycling
//! indefinitely.

/// Cap on the number of relaunches a worker may perform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartLimit {
    /// Relaunch forever (default).
    #[default]
    Unlimited,
    /// Stop the worker once this many restarts have been performed.
    AtMost(u32),
}

impl RestartLimit {
    /// True if `restarts` relaunches would exceed the budget.
    pub fn exhausted(&self, restarts: u32) -> bool {
        match self {
            RestartLimit::Unlimited => false,
            RestartLimit::AtMost(max) => restarts > *max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_exhausts() {
        assert!(!RestartLimit::Unlimited.exhausted(u32::MAX));
    }

    #[test]
    fn at_most_allows_up_to_the_cap() {
        let limit = RestartLimit::AtMost(3);
        assert!(!limit.exhausted(1));
        assert!(!limit.exhausted(3));
        assert!(limit.exhausted(4));
    }

    #[test]
    fn at_most_zero_stops_after_first_run() {
        assert!(RestartLimit::AtMost(0).exhausted(1));
    }
}
