//! # Built-in logging sink.
//!
//! [`LogWriter`] renders every runtime event through `tracing`, one line per
//! event with the pipeline name, attempt number, and delay attached as
//! fields. Child stderr lines are logged at error level, matching the
//! severity ffmpeg assigns them under `-loglevel error`.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Structured logging subscriber backed by `tracing`.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let pipeline = e.pipeline.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::PipelineStarting => {
                info!(pipeline, attempt = e.attempt, "launching child process");
            }
            EventKind::ProcessLaunched => {
                info!(pipeline, attempt = e.attempt, pid = e.pid, "child process started");
            }
            EventKind::LaunchFailed => {
                warn!(
                    pipeline,
                    attempt = e.attempt,
                    reason = e.reason.as_deref(),
                    "launch failed, will restart"
                );
            }
            EventKind::ProcessExited => {
                warn!(
                    pipeline,
                    attempt = e.attempt,
                    reason = e.reason.as_deref(),
                    "child process exited"
                );
            }
            EventKind::BackoffScheduled => {
                info!(
                    pipeline,
                    attempt = e.attempt,
                    delay_ms = e.delay_ms,
                    "restart scheduled"
                );
            }
            EventKind::RestartsExhausted => {
                error!(pipeline, attempt = e.attempt, "restart budget exhausted, giving up");
            }
            EventKind::PipelineStopped => {
                info!(pipeline, "worker stopped");
            }
            EventKind::StderrLine => {
                error!(pipeline, line = e.line.as_deref(), "ffmpeg");
            }
            EventKind::FatalLine => {
                warn!(
                    pipeline,
                    attempt = e.attempt,
                    line = e.line.as_deref(),
                    "fatal condition on stderr, restarting"
                );
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested, stopping all pipelines");
            }
            EventKind::AllStopped => {
                info!("all pipelines stopped");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
