//! # streamvisor
//!
//! **streamvisor** keeps long-running ffmpeg restream pipelines alive. Each
//! pipeline reads a network video source and publishes to a remote RTMP(S)
//! ingest endpoint; the supervisor restarts a pipeline's child process on
//! crashes, clean exits, and fatal stderr patterns, with exponential
//! backoff, and shuts the whole set down atomically on SIGINT/SIGTERM.
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ PipelineSpec │   │ PipelineSpec │   │ PipelineSpec │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  Supervisor                                               │
//! │  - registry of pipeline specs (create-once, read-many)    │
//! │  - Bus (broadcast events) + one listener per Subscribe    │
//! │  - shutdown token, fanned out as child tokens             │
//! └──────┬──────────────────┬──────────────────┬──────────────┘
//!        ▼                  ▼                  ▼
//!  PipelineWorker     PipelineWorker     PipelineWorker
//!  (retry loop,       (retry loop,       (retry loop,
//!   backoff)           backoff)           backoff)
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!  ProcessHandle      ProcessHandle      ProcessHandle
//!  (process group,    (process group,    (process group,
//!   stderr reader →    classifier →       group-wide
//!   Classifier)        fatal flag)        TERM/KILL)
//! ```
//!
//! ## Lifecycle of one pipeline
//! ```text
//! Idle → Launching → Running → Terminating → BackoffWait → Launching → …
//!                       │                        │
//!                       └──── stop requested ────┴──► Stopped
//! ```
//!
//! Every lifecycle step is published to the [`Bus`] as an [`Event`];
//! [`LogWriter`] renders them through `tracing`, and custom [`Subscribe`]
//! implementations can fan the same stream into metrics or alerting.
//!
//! ## Minimal embedding
//! ```no_run
//! use std::sync::Arc;
//! use streamvisor::{
//!     FfmpegCommand, LogWriter, PipelineSpec, Supervisor, SupervisorConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), streamvisor::RuntimeError> {
//!     let builder = FfmpegCommand::new("/usr/bin/ffmpeg");
//!     let mut sup = Supervisor::new(
//!         SupervisorConfig::default(),
//!         vec![Arc::new(LogWriter::new())],
//!     );
//!     sup.add_pipeline(PipelineSpec::ffmpeg(
//!         "ffmpeg#1",
//!         "http://example.com/in.m3u8",
//!         "rtmps://ingest.example.com/rtmp/key",
//!         &builder,
//!     ));
//!     sup.run().await
//! }
//! ```

pub mod classify;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod policies;
pub mod process;
pub mod provision;
pub mod shutdown;
pub mod subscribers;
pub mod supervisor;
pub mod worker;

pub use classify::{Classifier, Verdict};
pub use command::{CommandSpec, FfmpegCommand};
pub use config::Config;
pub use error::{PipelineError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartLimit};
pub use process::{ProcessHandle, Termination};
pub use provision::{GraphClient, LiveDetails, ProvisionedLive};
pub use subscribers::{LogWriter, Subscribe};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use worker::{PipelineSpec, PipelineWorker, WorkerConfig};
