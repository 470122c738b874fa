//! # Runtime events emitted by the supervisor and pipeline workers.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the metadata a
//! sink needs to report it (pipeline name, attempt number, backoff delay,
//! pid, stderr text). Each event gets a globally unique, monotonically
//! increasing sequence number so sinks can restore ordering after fan-out.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// Worker is about to launch its child process.
    ///
    /// Sets: `pipeline`, `attempt`.
    PipelineStarting,

    /// Child process spawned in its own process group.
    ///
    /// Sets: `pipeline`, `attempt`, `pid`.
    ProcessLaunched,

    /// The executable could not be spawned; treated as a fatal-restart.
    ///
    /// Sets: `pipeline`, `attempt`, `reason`.
    LaunchFailed,

    /// Child process exited on its own (any code, clean exits included).
    ///
    /// Sets: `pipeline`, `reason` (exit description).
    ProcessExited,

    /// Relaunch scheduled; the delay has not started yet when this fires.
    ///
    /// Sets: `pipeline`, `attempt` (new restart count), `delay_ms`.
    BackoffScheduled,

    /// Worker exhausted its restart budget and will not relaunch.
    ///
    /// Sets: `pipeline`, `attempt`.
    RestartsExhausted,

    /// Worker control loop exited; terminal for that pipeline.
    ///
    /// Sets: `pipeline`.
    PipelineStopped,

    // === Child output ===
    /// One forwarded line of child stderr.
    ///
    /// Sets: `pipeline`, `line`.
    StderrLine,

    /// The classifier flagged a line as unrecoverable.
    ///
    /// Sets: `pipeline`, `attempt`, `line`.
    FatalLine,

    // === Supervisor ===
    /// Shutdown requested (OS signal or explicit call).
    ShutdownRequested,

    /// Every registered worker has reached its stopped state.
    AllStopped,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Pipeline name, when the event belongs to one worker.
    pub pipeline: Option<Arc<str>>,
    /// Launch attempt number (1-based) or restart count, per kind.
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt, in milliseconds.
    pub delay_ms: Option<u64>,
    /// Child process id.
    pub pid: Option<u32>,
    /// Forwarded stderr text.
    pub line: Option<Arc<str>>,
    /// Human-readable reason (exit status, launch error, drop cause).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind with the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pipeline: None,
            attempt: None,
            delay_ms: None,
            pid: None,
            line: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_pipeline(mut self, name: impl Into<Arc<str>>) -> Self {
        self.pipeline = Some(name.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
