//! # Ownership of one child process and its process group.
//!
//! [`ProcessHandle`] launches the child in a fresh process group so that one
//! signal reaches the whole subtree — ffmpeg forks helpers, and a grandchild
//! that outlives the handle would keep publishing to the ingest endpoint.
//!
//! The termination sequence is fixed: graceful stop → bounded wait →
//! force-kill → brief wait → release. Every OS control call returns an
//! outcome that is logged and then ignored; nothing in the sequence can
//! abort it, and running it on an already-terminated handle is a no-op.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, warn};

use crate::command::CommandSpec;
use crate::error::PipelineError;

/// How long to wait for the process to die after a force-kill.
const FORCE_KILL_WAIT: Duration = Duration::from_secs(2);

/// Outcome of one termination sequence.
#[derive(Clone, Copy, Debug)]
pub struct Termination {
    /// True if the graceful stop timed out and a force-kill was needed.
    pub escalated: bool,
    /// Exit status, when the process was successfully reaped.
    pub status: Option<ExitStatus>,
}

/// Owns exactly one live OS child process (and its process group).
///
/// Invariant: a worker holds at most one non-terminated handle at a time;
/// the handle churns through a complete launch → run → terminate cycle with
/// no OS resources carried across cycles.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Option<Child>,
    pid: Option<u32>,
    status: Option<ExitStatus>,
    terminated: bool,
}

impl ProcessHandle {
    /// Spawns the command in a new process group.
    ///
    /// Standard output is discarded; standard error is captured as a live
    /// byte stream (see [`ProcessHandle::take_stderr`]). Fails with
    /// [`PipelineError::Launch`] if the executable is missing or the OS
    /// refuses to spawn.
    pub fn launch(spec: &CommandSpec) -> Result<Self, PipelineError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| PipelineError::Launch { source })?;
        let pid = child.id();
        Ok(Self {
            child: Some(child),
            pid,
            status: None,
            terminated: false,
        })
    }

    /// OS process id, while the handle is live.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Takes the child's stderr stream for a dedicated reader task.
    ///
    /// The stream reaches EOF once the process dies, which ends the reader
    /// naturally during termination.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.as_mut().and_then(|c| c.stderr.take())
    }

    /// Non-blocking liveness check; returns the exit status once terminated.
    pub fn poll(&mut self) -> Option<ExitStatus> {
        if let Some(status) = self.status {
            return Some(status);
        }
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(err) => {
                debug!(pid = self.pid, error = %err, "try_wait failed");
                None
            }
        }
    }

    /// Sends SIGTERM to the entire process group.
    ///
    /// On non-Unix platforms this falls back to killing the leader.
    pub fn request_graceful_stop(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.signal_group(libc::SIGTERM)
        }
        #[cfg(not(unix))]
        {
            match self.child.as_mut() {
                Some(child) => child.start_kill(),
                None => Ok(()),
            }
        }
    }

    /// Sends SIGKILL to the entire process group.
    pub fn force_kill(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.signal_group(libc::SIGKILL)
        }
        #[cfg(not(unix))]
        {
            match self.child.as_mut() {
                Some(child) => child.start_kill(),
                None => Ok(()),
            }
        }
    }

    /// Waits up to `timeout` for the process to exit; true if it did.
    pub async fn await_exit(&mut self, timeout: Duration) -> bool {
        if self.status.is_some() {
            return true;
        }
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                self.status = Some(status);
                true
            }
            Ok(Err(err)) => {
                // Cannot wait on it; the pid is gone from our perspective.
                debug!(pid = self.pid, error = %err, "wait failed");
                true
            }
            Err(_elapsed) => false,
        }
    }

    /// Runs the full termination sequence and releases all handle resources.
    ///
    /// Idempotent: a second call on the same handle returns immediately
    /// without signaling anything.
    pub async fn terminate(&mut self, grace: Duration) -> Termination {
        if self.terminated {
            return Termination {
                escalated: false,
                status: self.status,
            };
        }

        let pid = self.pid;
        let mut escalated = false;

        if self.poll().is_none() {
            if let Err(err) = self.request_graceful_stop() {
                debug!(pid, error = %err, "graceful stop signal failed");
            }
            if !self.await_exit(grace).await {
                escalated = true;
                let timeout = PipelineError::TerminationTimeout { wait: grace };
                warn!(pid, error = %timeout, "escalating to force kill");
                if let Err(err) = self.force_kill() {
                    debug!(pid, error = %err, "force kill signal failed");
                }
                if !self.await_exit(FORCE_KILL_WAIT).await {
                    warn!(pid, "process still not reaped after force kill");
                }
            }
        }

        self.release();
        Termination {
            escalated,
            status: self.status,
        }
    }

    /// True once the termination sequence has completed.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Drops the child handle and pid regardless of how the process died.
    fn release(&mut self) {
        self.terminated = true;
        self.child = None;
        self.pid = None;
    }

    #[cfg(unix)]
    fn signal_group(&self, sig: libc::c_int) -> std::io::Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        // process_group(0) made the child the leader of its own group.
        let ret = unsafe { libc::killpg(pid as libc::pid_t, sig) };
        if ret == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh", vec!["-c".into(), script.into()])
    }

    #[tokio::test]
    async fn launch_missing_binary_fails() {
        let err = ProcessHandle::launch(&CommandSpec::new(
            "/nonexistent/streamvisor-test-binary",
            vec![],
        ))
        .unwrap_err();
        assert!(matches!(err, PipelineError::Launch { .. }));
    }

    #[tokio::test]
    async fn poll_reports_exit() {
        let mut handle = ProcessHandle::launch(&sh("exit 3")).unwrap();
        assert!(handle.await_exit(Duration::from_secs(5)).await);
        let status = handle.poll().expect("exited");
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let mut handle = ProcessHandle::launch(&sh("sleep 30")).unwrap();
        let first = handle.terminate(Duration::from_secs(5)).await;
        assert!(handle.is_terminated());

        let second = handle.terminate(Duration::from_secs(5)).await;
        assert!(!second.escalated);
        assert_eq!(
            first.status.map(|s| s.code()),
            second.status.map(|s| s.code())
        );
    }

    #[tokio::test]
    async fn terminate_after_exit_is_a_noop() {
        let mut handle = ProcessHandle::launch(&sh("exit 0")).unwrap();
        assert!(handle.await_exit(Duration::from_secs(5)).await);
        let term = handle.terminate(Duration::from_secs(5)).await;
        assert!(!term.escalated);
        assert_eq!(term.status.and_then(|s| s.code()), Some(0));
    }

    /// True once the pid no longer denotes a running process. A zombie
    /// counts as gone: it died and merely awaits reaping by init.
    fn process_gone(pid: i32) -> bool {
        if unsafe { libc::kill(pid, 0) } != 0 {
            return true;
        }
        #[cfg(target_os = "linux")]
        {
            if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                // Field 3 (after the parenthesized comm) is the state.
                if let Some(rest) = stat.rsplit(')').next() {
                    return rest.trim_start().starts_with('Z');
                }
            }
        }
        false
    }

    #[tokio::test]
    async fn termination_kills_the_whole_group() {
        // The shell backgrounds a sleep (the grandchild), reports its pid on
        // stderr, then blocks. After terminate() the grandchild must be gone
        // too, because the signal targets the process group.
        let mut handle =
            ProcessHandle::launch(&sh("sleep 30 & echo $! >&2; wait")).unwrap();
        let stderr = handle.take_stderr().expect("stderr piped");
        let mut lines = BufReader::new(stderr).lines();
        let grandchild: i32 = lines
            .next_line()
            .await
            .expect("read pid line")
            .expect("pid line present")
            .trim()
            .parse()
            .expect("numeric pid");

        handle.terminate(Duration::from_secs(5)).await;

        let mut dead = false;
        for _ in 0..40 {
            if process_gone(grandchild) {
                dead = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(dead, "grandchild pid {grandchild} survived group termination");
    }
}
