//! # PipelineWorker: supervises one transcoding pipeline.
//!
//! Drives one [`ProcessHandle`] through the retry state machine:
//!
//! ```text
//! Idle → Launching → Running → Terminating → BackoffWait → Launching
//!                       │                        │
//!                       └──── stop requested ────┴──► Stopped
//! ```
//!
//! While `Running`, a dedicated reader task classifies every stderr line and
//! raises an atomic fatal flag on an unrecoverable pattern; concurrently the
//! worker polls process liveness on a fixed interval. Process exit (any
//! code — these pipelines are expected to run forever, so even a clean exit
//! means restart), a fatal verdict, or a stop request each end `Running`
//! within one poll interval.
//!
//! ## Rules
//! - Transitions are strictly sequential within one worker; `Terminating`
//!   always completes in full before backoff or relaunch.
//! - The restart count increments monotonically until stop.
//! - The backoff wait is cancellable; stop wakes it immediately.
//! - Nothing escapes `run()`: every failure path re-enters the loop or
//!   reaches `Stopped` cleanly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::classify::{Classifier, Verdict};
use crate::command::{CommandSpec, FfmpegCommand};
use crate::error::PipelineError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, RestartLimit};
use crate::process::ProcessHandle;

/// Immutable description of one source-to-target pipeline.
///
/// Created once at startup; the command already embeds the source and
/// target, so every relaunch uses the identical argument list.
#[derive(Clone, Debug)]
pub struct PipelineSpec {
    /// Stable pipeline name, used in every event and log line.
    pub name: Arc<str>,
    /// Network video source URI.
    pub source: String,
    /// Remote ingest target URI.
    pub target: String,
    /// Resolved child command line.
    pub command: CommandSpec,
}

impl PipelineSpec {
    pub fn new(
        name: impl Into<Arc<str>>,
        source: impl Into<String>,
        target: impl Into<String>,
        command: CommandSpec,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            command,
        }
    }

    /// Builds a spec whose command restreams `source` to `target` via ffmpeg.
    pub fn ffmpeg(
        name: impl Into<Arc<str>>,
        source: impl Into<String>,
        target: impl Into<String>,
        builder: &FfmpegCommand,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let command = builder.build(&source, &target);
        Self::new(name, source, target, command)
    }
}

/// Per-worker supervision knobs.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Liveness poll interval while the child runs.
    pub poll_interval: Duration,
    /// Bounded wait for graceful stop before force-kill.
    pub grace: Duration,
    /// Delay growth between relaunch attempts.
    pub backoff: BackoffPolicy,
    /// Restart budget (unlimited by default).
    pub restarts: RestartLimit,
    /// Forward only fatal/error stderr lines to the sink instead of all.
    pub errors_only: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            grace: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
            restarts: RestartLimit::Unlimited,
            errors_only: false,
        }
    }
}

/// Supervises one pipeline's child process with restarts and backoff.
pub struct PipelineWorker {
    spec: PipelineSpec,
    cfg: WorkerConfig,
    classifier: Arc<Classifier>,
    bus: Bus,
}

impl PipelineWorker {
    pub fn new(
        spec: PipelineSpec,
        cfg: WorkerConfig,
        classifier: Arc<Classifier>,
        bus: Bus,
    ) -> Self {
        Self {
            spec,
            cfg,
            classifier,
            bus,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Runs the control loop until stop is requested or the restart budget
    /// is exhausted. Always publishes `PipelineStopped` on the way out.
    pub async fn run(self, stop: CancellationToken) {
        let mut restarts: u32 = 0;

        loop {
            if stop.is_cancelled() {
                break;
            }

            let attempt = restarts + 1;
            self.publish(
                Event::new(EventKind::PipelineStarting).with_attempt(attempt),
            );

            match ProcessHandle::launch(&self.spec.command) {
                Ok(mut handle) => {
                    let mut launched =
                        Event::new(EventKind::ProcessLaunched).with_attempt(attempt);
                    if let Some(pid) = handle.id() {
                        launched = launched.with_pid(pid);
                    }
                    self.publish(launched);

                    // The fatal flag is fresh per launch; the reader sets it,
                    // the watch loop reads it.
                    let fatal = Arc::new(AtomicBool::new(false));
                    if let Some(stderr) = handle.take_stderr() {
                        tokio::spawn(read_stderr(
                            stderr,
                            self.spec.name.clone(),
                            attempt,
                            Arc::clone(&self.classifier),
                            self.bus.clone(),
                            self.cfg.errors_only,
                            Arc::clone(&fatal),
                        ));
                    }

                    self.watch(&mut handle, &fatal, &stop).await;
                    // Terminating: runs in full no matter why Running ended.
                    handle.terminate(self.cfg.grace).await;
                }
                Err(err) => {
                    // LaunchError is an immediate fatal-restart, never fatal
                    // to the supervisor.
                    self.publish(
                        Event::new(EventKind::LaunchFailed)
                            .with_attempt(attempt)
                            .with_reason(err.to_string()),
                    );
                }
            }

            if stop.is_cancelled() {
                break;
            }

            restarts += 1;
            if self.cfg.restarts.exhausted(restarts) {
                self.publish(
                    Event::new(EventKind::RestartsExhausted).with_attempt(restarts),
                );
                break;
            }

            let delay = self.cfg.backoff.delay(restarts - 1);
            self.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_attempt(restarts)
                    .with_delay(delay),
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = stop.cancelled() => break,
            }
        }

        self.publish(Event::new(EventKind::PipelineStopped));
    }

    /// The `Running` state: waits for process exit, a fatal verdict, or a
    /// stop request. Detection latency is bounded by one poll interval.
    async fn watch(
        &self,
        handle: &mut ProcessHandle,
        fatal: &AtomicBool,
        stop: &CancellationToken,
    ) {
        loop {
            if let Some(status) = handle.poll() {
                let err = PipelineError::RuntimeFatal {
                    reason: format!("process exited with {status}"),
                };
                self.publish(
                    Event::new(EventKind::ProcessExited).with_reason(err.to_string()),
                );
                return;
            }
            if fatal.load(Ordering::Acquire) {
                // Give ffmpeg a moment to flush before termination.
                sleep(Duration::from_millis(100)).await;
                return;
            }
            tokio::select! {
                _ = sleep(self.cfg.poll_interval) => {}
                _ = stop.cancelled() => return,
            }
        }
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_pipeline(self.spec.name.clone()));
    }
}

/// Reads the child's stderr line by line until EOF.
///
/// Lines are decoded best-effort (invalid UTF-8 never aborts the reader),
/// forwarded to the bus per the visibility mode, and checked against the
/// classifier. The task ends naturally when the stream closes during
/// termination.
async fn read_stderr(
    stderr: ChildStderr,
    name: Arc<str>,
    attempt: u32,
    classifier: Arc<Classifier>,
    bus: Bus,
    errors_only: bool,
    fatal: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let verdict = classifier.classify(line);
                let visible = !errors_only
                    || verdict == Verdict::Fatal
                    || Classifier::mentions_error(line);
                if visible {
                    bus.publish(
                        Event::new(EventKind::StderrLine)
                            .with_pipeline(name.clone())
                            .with_line(line.to_string()),
                    );
                }
                if verdict == Verdict::Fatal && !fatal.swap(true, Ordering::AcqRel) {
                    bus.publish(
                        Event::new(EventKind::FatalLine)
                            .with_pipeline(name.clone())
                            .with_attempt(attempt)
                            .with_line(line.to_string()),
                    );
                }
            }
            Err(err) => {
                warn!(pipeline = %name, error = %err, "stderr reader failed");
                break;
            }
        }
    }
}
