//! Error types used by the streamvisor runtime and pipeline workers.
//!
//! Two enums cover the failure taxonomy:
//!
//! - [`RuntimeError`] — failures of the supervisor runtime itself
//!   (configuration, provisioning, nothing to supervise).
//! - [`PipelineError`] — failures of one pipeline's child process. These are
//!   always handled inside the owning worker: a worker that cannot recover
//!   still reaches its stopped state cleanly instead of aborting the process.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A required configuration value was missing or malformed.
    #[error("invalid configuration: {name}: {reason}")]
    Config {
        /// Environment variable or setting name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The provisioning collaborator could not produce an ingest target.
    ///
    /// Dropping the affected pipeline is the caller's job; this error is
    /// never fatal to sibling pipelines.
    #[error("provisioning failed during {action}: {reason}")]
    Provisioning {
        /// Which remote call failed (e.g. "create live video").
        action: String,
        /// Underlying cause, best effort.
        reason: String,
    },

    /// No pipeline could be registered at startup.
    ///
    /// This is the only condition that terminates the whole system.
    #[error("no pipelines could be registered")]
    NoPipelines,
}

impl RuntimeError {
    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config { .. } => "runtime_config",
            RuntimeError::Provisioning { .. } => "runtime_provisioning",
            RuntimeError::NoPipelines => "runtime_no_pipelines",
        }
    }
}

/// Errors produced while running one pipeline's child process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The child executable could not be spawned.
    ///
    /// Treated as an immediate fatal-restart by the worker, never as a
    /// supervisor-level failure.
    #[error("failed to launch child process: {source}")]
    Launch {
        #[source]
        source: std::io::Error,
    },

    /// The classifier flagged unrecoverable child output, or the process
    /// exited when it was expected to run forever.
    #[error("fatal pipeline condition: {reason}")]
    RuntimeFatal {
        /// The fatal stderr line or exit description.
        reason: String,
    },

    /// Graceful stop did not complete within the bounded wait.
    ///
    /// Escalated to a force-kill and always recovered locally.
    #[error("graceful stop did not complete within {wait:?}")]
    TerminationTimeout {
        /// How long the worker waited before escalating.
        wait: Duration,
    },
}

impl PipelineError {
    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PipelineError::Launch { .. } => "pipeline_launch",
            PipelineError::RuntimeFatal { .. } => "pipeline_fatal",
            PipelineError::TerminationTimeout { .. } => "pipeline_termination_timeout",
        }
    }
}
