// Buffered executor: capture everything, terminate on request

use super::{
    drain, exit_result, feed_stdin, is_alive, join_pipes, kill_child, kill_leftovers, signal,
    spawn_command, CommandExecutor, CommandSpec, ExecError, ExecOutput,
};
use crate::agents::context::RunContext;
use crate::utils::lock_mutex_recover;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(100);
const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Pid of the process a runner currently has in flight.
///
/// One tracker is shared by a runner's buffered and streaming executors so
/// `terminate_process` reaches the process whichever mode started it.
#[derive(Debug, Default)]
pub struct ProcessTracker {
    // Guarded separately from any parser state
    current_pid: Mutex<Option<u32>>,
    released: Notify,
}

impl ProcessTracker {
    pub fn current_pid(&self) -> Option<u32> {
        *lock_mutex_recover(&self.current_pid)
    }

    pub(crate) fn track(&self, pid: Option<u32>) {
        *lock_mutex_recover(&self.current_pid) = pid;
    }

    /// Forget `pid` once it has been reaped, unless a newer process replaced it
    pub(crate) fn release(&self, pid: Option<u32>) {
        {
            let mut current = lock_mutex_recover(&self.current_pid);
            if *current == pid {
                *current = None;
            }
        }
        self.released.notify_waiters();
    }

    fn still_tracking(&self, pid: u32) -> bool {
        self.current_pid() == Some(pid)
    }

    /// Stop the tracked process: SIGTERM, wait up to 2s, then SIGKILL.
    ///
    /// Returns once the kill decision is made. A no-op when nothing is
    /// running; a process that already exited counts as terminated.
    pub async fn terminate_process(&self) -> Result<(), ExecError> {
        let Some(pid) = self.current_pid() else {
            return Ok(());
        };

        log::info!("[ProcessTracker] Sending SIGTERM to pid {}", pid);
        if !signal::terminate(pid)? {
            return Ok(());
        }

        let deadline = Instant::now() + TERMINATE_GRACE_PERIOD;
        while Instant::now() < deadline {
            if !self.still_tracking(pid) || !is_alive(pid) {
                log::debug!("[ProcessTracker] pid {} exited after SIGTERM", pid);
                return Ok(());
            }
            tokio::select! {
                _ = self.released.notified() => {}
                _ = tokio::time::sleep(TERMINATE_POLL_INTERVAL) => {}
            }
        }

        if self.still_tracking(pid) {
            log::warn!(
                "[ProcessTracker] pid {} ignored SIGTERM for {:?}, sending SIGKILL",
                pid,
                TERMINATE_GRACE_PERIOD
            );
            signal::kill(pid)?;
        }
        Ok(())
    }
}

/// Runs a command to completion and reports its pid to a [`ProcessTracker`]
#[derive(Debug, Default)]
pub struct BufferedExecutor {
    tracker: Arc<ProcessTracker>,
}

impl BufferedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker to hand to other executors of the same runner
    pub fn tracker(&self) -> Arc<ProcessTracker> {
        self.tracker.clone()
    }

    /// Pid of the process currently being waited on
    pub fn current_pid(&self) -> Option<u32> {
        self.tracker.current_pid()
    }

    pub async fn terminate_process(&self) -> Result<(), ExecError> {
        self.tracker.terminate_process().await
    }
}

#[async_trait]
impl CommandExecutor for BufferedExecutor {
    async fn execute(&self, ctx: &RunContext, command: &CommandSpec) -> ExecOutput {
        if let Some(err) = ctx.err() {
            return ExecOutput::failed(ExecError::from_context(&err));
        }

        let mut child = match spawn_command(command) {
            Ok(child) => child,
            Err(e) => return ExecOutput::failed(e),
        };
        let pid = child.id();
        self.tracker.track(pid);
        log::debug!(
            "[BufferedExecutor] Started pid {:?}: {}",
            pid,
            command.describe()
        );

        let writer = feed_stdin(&mut child, command.stdin.as_deref());
        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        let status = tokio::select! {
            status = child.wait() => status.map_err(ExecError::from).and_then(exit_result),
            err = ctx.done() => {
                kill_child(&mut child).await;
                Err(ExecError::from_context(&err))
            }
        };
        self.tracker.release(pid);
        if let Some(writer) = writer {
            writer.abort();
        }

        if matches!(status, Err(ref e) if e.is_context_error()) {
            stdout_task.abort();
            stderr_task.abort();
            return ExecOutput {
                stdout: Vec::new(),
                stderr: Vec::new(),
                status,
                stream: None,
            };
        }

        kill_leftovers(pid);
        match join_pipes(ctx, stdout_task, stderr_task).await {
            Ok((stdout, stderr)) => ExecOutput {
                stdout,
                stderr,
                status,
                stream: None,
            },
            Err(err) => {
                log::warn!(
                    "[BufferedExecutor] Output of pid {:?} still open after exit: {}",
                    pid,
                    err
                );
                ExecOutput::failed(err)
            }
        }
    }
}
