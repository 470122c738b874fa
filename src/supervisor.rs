//! # Supervisor: owns the worker set and the shutdown path.
//!
//! The [`Supervisor`] holds the pipeline registry (create-once, read-many —
//! entries are never removed while running), fans out start/stop to the
//! workers, and is the single point that receives shutdown signals.
//!
//! ```text
//! PipelineSpec[0..N] ──► add_pipeline() ──► registry
//!                                              │ start_all()
//!                        ┌─────────────────────┼─────────────────────┐
//!                        ▼                     ▼                     ▼
//!                  PipelineWorker        PipelineWorker        PipelineWorker
//!                  (child token)         (child token)         (child token)
//!                        │                     │                     │
//!                        └── publish(Event) ──► Bus ──► listener per Subscribe
//!
//! Shutdown:
//!   signal / request_shutdown() ──► cancel token ──► workers terminate
//!   await_all_stopped(): coarse poll until the active counter hits zero
//! ```
//!
//! One worker exhausting its restart budget is just an event on the bus;
//! the supervisor keeps supervising the rest.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::classify::Classifier;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::shutdown;
use crate::subscribers::Subscribe;
use crate::worker::{PipelineSpec, PipelineWorker, WorkerConfig};

/// Supervisor-level configuration.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Knobs applied to every worker.
    pub worker: WorkerConfig,
    /// Stderr classifier shared by all workers.
    pub classifier: Classifier,
    /// Poll interval for [`Supervisor::await_all_stopped`].
    pub stop_poll: Duration,
    /// Event bus ring-buffer capacity.
    pub bus_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            classifier: Classifier::default(),
            stop_poll: Duration::from_secs(1),
            bus_capacity: 1024,
        }
    }
}

/// Owns the set of pipeline workers and coordinates group-wide shutdown.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    classifier: Arc<Classifier>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    pipelines: Vec<PipelineSpec>,
    stop: CancellationToken,
    started: AtomicBool,
    shutdown_published: AtomicBool,
    active: Arc<AtomicUsize>,
}

impl Supervisor {
    pub fn new(cfg: SupervisorConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let classifier = Arc::new(cfg.classifier.clone());
        Self {
            cfg,
            bus,
            classifier,
            subscribers,
            pipelines: Vec::new(),
            stop: CancellationToken::new(),
            started: AtomicBool::new(false),
            shutdown_published: AtomicBool::new(false),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The shared event bus (subscribe here for custom monitoring).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Registers a pipeline; does not start it.
    pub fn add_pipeline(&mut self, spec: PipelineSpec) {
        self.pipelines.push(spec);
    }

    /// Number of registered pipelines.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Launches every registered worker's control loop.
    ///
    /// Each worker runs independently on its own task with a child
    /// cancellation token; one worker's failure never blocks another.
    /// Calling this twice is a no-op.
    pub fn start_all(&self) -> Result<(), RuntimeError> {
        if self.pipelines.is_empty() {
            return Err(RuntimeError::NoPipelines);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.spawn_subscriber_listeners();
        self.active.store(self.pipelines.len(), Ordering::Release);

        for spec in &self.pipelines {
            let worker = PipelineWorker::new(
                spec.clone(),
                self.cfg.worker.clone(),
                Arc::clone(&self.classifier),
                self.bus.clone(),
            );
            let token = self.stop.child_token();
            let active = Arc::clone(&self.active);
            tokio::spawn(async move {
                worker.run(token).await;
                active.fetch_sub(1, Ordering::AcqRel);
            });
        }
        Ok(())
    }

    /// Propagates stop to every worker.
    ///
    /// Idempotent; safe to call repeatedly and from any task, including the
    /// signal-handling context.
    pub fn request_shutdown(&self) {
        if !self.shutdown_published.swap(true, Ordering::AcqRel) {
            self.bus.publish(Event::new(EventKind::ShutdownRequested));
        }
        self.stop.cancel();
    }

    /// Token cancelled when shutdown is requested; hand this to external
    /// contexts that need to trigger or observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Blocks until every started worker has reached its stopped state,
    /// checking at a coarse poll interval.
    pub async fn await_all_stopped(&self) {
        loop {
            if self.active.load(Ordering::Acquire) == 0 {
                return;
            }
            sleep(self.cfg.stop_poll).await;
        }
    }

    /// Convenience entry point: start everything, run until either all
    /// workers stop on their own or a termination signal arrives, then
    /// drive the group shutdown to completion.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.start_all()?;

        tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => {
                if let Err(err) = res {
                    warn!(error = %err, "signal listener failed, shutting down");
                }
                self.request_shutdown();
            }
            _ = self.await_all_stopped() => {}
        }

        self.await_all_stopped().await;
        self.bus.publish(Event::new(EventKind::AllStopped));
        Ok(())
    }

    /// One listener task per subscriber, fed from an independent bus
    /// receiver, so a slow sink lags (and skips) instead of blocking anyone.
    fn spawn_subscriber_listeners(&self) {
        for sub in &self.subscribers {
            let mut rx = self.bus.subscribe();
            let sub = Arc::clone(sub);
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(ev) => sub.on_event(&ev).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(subscriber = sub.name(), skipped, "subscriber lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }
    }
}
