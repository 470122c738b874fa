//! Worker and supervisor behavior against real mock child processes.
//!
//! Every test uses `/bin/sh` as the "transcoder": scripts exit cleanly,
//! emit fatal-looking stderr lines, or block forever, exercising the retry
//! state machine without ffmpeg.

#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use streamvisor::{
    BackoffPolicy, Bus, Classifier, CommandSpec, Event, EventKind, JitterPolicy, PipelineSpec,
    PipelineWorker, RestartLimit, Supervisor, SupervisorConfig, WorkerConfig,
};

const WAIT: Duration = Duration::from_secs(10);

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("/bin/sh", vec!["-c".into(), script.into()])
}

fn spec(name: &str, script: &str) -> PipelineSpec {
    PipelineSpec::new(name, "src://input", "dst://ingest", sh(script))
}

/// Worker knobs scaled down so restart cycles complete in milliseconds.
fn fast_cfg() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(50),
        grace: Duration::from_secs(2),
        backoff: BackoffPolicy {
            base: Duration::from_millis(50),
            max: Duration::from_millis(200),
            jitter: JitterPolicy::None,
        },
        restarts: RestartLimit::Unlimited,
        errors_only: false,
    }
}

fn start_worker(
    spec: PipelineSpec,
    cfg: WorkerConfig,
    bus: &Bus,
) -> (CancellationToken, JoinHandle<()>) {
    let worker = PipelineWorker::new(spec, cfg, Arc::new(Classifier::default()), bus.clone());
    let token = CancellationToken::new();
    let handle = tokio::spawn(worker.run(token.clone()));
    (token, handle)
}

/// Waits for the next event of `kind`, skipping everything else.
async fn next_event(rx: &mut Receiver<Event>, kind: EventKind) -> Event {
    timeout(WAIT, async {
        loop {
            let ev = rx.recv().await.expect("bus closed");
            if ev.kind == kind {
                return ev;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
}

/// Waits for the next event of `kind` belonging to a specific pipeline.
async fn next_event_for(rx: &mut Receiver<Event>, kind: EventKind, pipeline: &str) -> Event {
    timeout(WAIT, async {
        loop {
            let ev = rx.recv().await.expect("bus closed");
            if ev.kind == kind && ev.pipeline.as_deref() == Some(pipeline) {
                return ev;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind:?} on {pipeline}"))
}

#[tokio::test]
async fn clean_exit_is_restarted() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let (token, handle) = start_worker(spec("w", "exit 0"), fast_cfg(), &bus);

    let first = next_event(&mut rx, EventKind::PipelineStarting).await;
    assert_eq!(first.attempt, Some(1));

    // A clean exit is not success-terminal: the worker backs off and
    // relaunches.
    next_event(&mut rx, EventKind::ProcessExited).await;
    let backoff = next_event(&mut rx, EventKind::BackoffScheduled).await;
    assert_eq!(backoff.delay_ms, Some(50));

    let second = next_event(&mut rx, EventKind::PipelineStarting).await;
    assert_eq!(second.attempt, Some(2));

    token.cancel();
    timeout(WAIT, handle).await.expect("worker hung").unwrap();
}

#[tokio::test]
async fn fatal_stderr_line_triggers_relaunch_with_base_delay() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let (token, handle) = start_worker(
        spec("w", r#"echo "Error retrieving a packet" >&2; sleep 30"#),
        fast_cfg(),
        &bus,
    );

    let line = next_event(&mut rx, EventKind::StderrLine).await;
    assert_eq!(line.line.as_deref(), Some("Error retrieving a packet"));

    let fatal = next_event(&mut rx, EventKind::FatalLine).await;
    assert_eq!(fatal.attempt, Some(1));

    // First backoff uses the base delay.
    let backoff = next_event(&mut rx, EventKind::BackoffScheduled).await;
    assert_eq!(backoff.attempt, Some(1));
    assert_eq!(backoff.delay_ms, Some(50));

    let relaunch = next_event(&mut rx, EventKind::PipelineStarting).await;
    assert_eq!(relaunch.attempt, Some(2));

    token.cancel();
    timeout(WAIT, handle).await.expect("worker hung").unwrap();
}

#[tokio::test]
async fn stop_during_backoff_wakes_early() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let mut cfg = fast_cfg();
    cfg.backoff.base = Duration::from_secs(30);
    cfg.backoff.max = Duration::from_secs(30);
    let (token, handle) = start_worker(spec("w", "exit 0"), cfg, &bus);

    next_event(&mut rx, EventKind::BackoffScheduled).await;

    let started = Instant::now();
    token.cancel();
    timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not stop promptly during backoff")
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    next_event(&mut rx, EventKind::PipelineStopped).await;
}

#[tokio::test]
async fn restart_budget_stops_the_worker() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let mut cfg = fast_cfg();
    cfg.restarts = RestartLimit::AtMost(1);
    let (_token, handle) = start_worker(spec("w", "exit 1"), cfg, &bus);

    // Two attempts (the initial run plus the single allowed restart), then
    // the worker gives up on its own, without any stop request.
    assert_eq!(
        next_event(&mut rx, EventKind::PipelineStarting).await.attempt,
        Some(1)
    );
    assert_eq!(
        next_event(&mut rx, EventKind::PipelineStarting).await.attempt,
        Some(2)
    );
    let exhausted = next_event(&mut rx, EventKind::RestartsExhausted).await;
    assert_eq!(exhausted.attempt, Some(2));
    next_event(&mut rx, EventKind::PipelineStopped).await;

    timeout(WAIT, handle).await.expect("worker hung").unwrap();
}

#[tokio::test]
async fn launch_error_is_a_fatal_restart_not_a_crash() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let (token, handle) = start_worker(
        PipelineSpec::new(
            "w",
            "src://input",
            "dst://ingest",
            CommandSpec::new("/nonexistent/streamvisor-test-binary", vec![]),
        ),
        fast_cfg(),
        &bus,
    );

    // The worker keeps cycling through launch failures.
    next_event(&mut rx, EventKind::LaunchFailed).await;
    next_event(&mut rx, EventKind::BackoffScheduled).await;
    next_event(&mut rx, EventKind::LaunchFailed).await;

    token.cancel();
    timeout(WAIT, handle).await.expect("worker hung").unwrap();
}

fn fast_supervisor_cfg() -> SupervisorConfig {
    SupervisorConfig {
        worker: fast_cfg(),
        classifier: Classifier::default(),
        stop_poll: Duration::from_millis(100),
        bus_capacity: 1024,
    }
}

#[tokio::test]
async fn one_failing_pipeline_does_not_disturb_siblings() {
    let mut sup = Supervisor::new(fast_supervisor_cfg(), vec![]);
    sup.add_pipeline(PipelineSpec::new(
        "broken",
        "s",
        "t",
        CommandSpec::new("/nonexistent/streamvisor-test-binary", vec![]),
    ));
    sup.add_pipeline(spec("healthy-1", "sleep 30"));
    sup.add_pipeline(spec("healthy-2", "sleep 30"));

    let mut rx = sup.bus().subscribe();
    sup.start_all().expect("start");

    // Both healthy workers reach Running and stay there while the broken
    // one cycles through launch failures.
    next_event_for(&mut rx, EventKind::ProcessLaunched, "healthy-1").await;
    next_event_for(&mut rx, EventKind::ProcessLaunched, "healthy-2").await;
    next_event_for(&mut rx, EventKind::LaunchFailed, "broken").await;
    next_event_for(&mut rx, EventKind::LaunchFailed, "broken").await;

    sup.request_shutdown();
    timeout(WAIT, sup.await_all_stopped())
        .await
        .expect("workers did not stop");
}

#[tokio::test]
async fn supervisor_end_to_end_fatal_line_relaunch() {
    let mut sup = Supervisor::new(fast_supervisor_cfg(), vec![]);
    sup.add_pipeline(spec(
        "pipeline",
        r#"echo "Error retrieving a packet" >&2; sleep 30"#,
    ));

    let mut rx = sup.bus().subscribe();
    sup.start_all().expect("start");

    next_event_for(&mut rx, EventKind::FatalLine, "pipeline").await;
    let backoff = next_event_for(&mut rx, EventKind::BackoffScheduled, "pipeline").await;
    assert_eq!(backoff.delay_ms, Some(50));
    let relaunch = next_event_for(&mut rx, EventKind::PipelineStarting, "pipeline").await;
    assert_eq!(relaunch.attempt, Some(2));

    sup.request_shutdown();
    // Idempotent: a second request is harmless.
    sup.request_shutdown();
    timeout(WAIT, sup.await_all_stopped())
        .await
        .expect("workers did not stop");
}

#[tokio::test]
async fn start_all_without_pipelines_is_an_error() {
    let sup = Supervisor::new(fast_supervisor_cfg(), vec![]);
    assert!(sup.start_all().is_err());
}

#[tokio::test]
async fn errors_only_mode_filters_benign_lines() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let mut cfg = fast_cfg();
    cfg.errors_only = true;
    let (token, handle) = start_worker(
        spec(
            "w",
            r#"echo "frame= 100 fps=25" >&2; echo "some error happened" >&2; sleep 30"#,
        ),
        cfg,
        &bus,
    );

    // Only the line mentioning "error" is forwarded.
    let line = next_event(&mut rx, EventKind::StderrLine).await;
    assert_eq!(line.line.as_deref(), Some("some error happened"));

    token.cancel();
    timeout(WAIT, handle).await.expect("worker hung").unwrap();
}
