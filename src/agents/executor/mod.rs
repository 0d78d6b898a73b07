// Subprocess execution for agent CLIs
//
// Two executors share one contract: run a command to completion, capture both
// pipes, and hand back the bytes together with the exit outcome. The
// buffered executor tracks the running pid so it can be terminated from
// another task; the streaming executor additionally parses NDJSON progress
// while the process runs.

mod buffered;
mod streaming;

pub use buffered::{BufferedExecutor, ProcessTracker};
pub use streaming::{ParserFactory, StreamChannel, StreamingExecutor};

use crate::agents::context::RunContext;
use crate::agents::errors::AgentError;
use crate::agents::format_parsers::StreamResult;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Fully resolved command line for one CLI invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed
    pub stdin: Option<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Program and arguments for log lines (prompt text is never logged)
    pub fn describe(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while running process: {0}")]
    Io(#[from] io::Error),

    #[error("process exited with {}", describe_exit(.code))]
    ExitStatus { code: Option<i32> },

    #[error("process cancelled")]
    Cancelled,

    #[error("process timed out")]
    TimedOut,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl ExecError {
    /// The program could not be found or is not executable
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExecError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    pub fn is_context_error(&self) -> bool {
        matches!(self, ExecError::Cancelled | ExecError::TimedOut)
    }

    pub(crate) fn from_context(err: &AgentError) -> Self {
        match err {
            AgentError::TimedOut => ExecError::TimedOut,
            _ => ExecError::Cancelled,
        }
    }
}

/// Everything a finished (or failed) process produced
#[derive(Debug)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: Result<(), ExecError>,
    /// Terminal result captured from the protocol stream, if one was parsed
    pub stream: Option<StreamResult>,
}

impl ExecOutput {
    pub fn failed(err: ExecError) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            status: Err(err),
            stream: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_ok()
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion, or until the context finishes
    async fn execute(&self, ctx: &RunContext, command: &CommandSpec) -> ExecOutput;
}

pub(crate) fn spawn_command(command: &CommandSpec) -> Result<Child, ExecError> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so signals reach the CLI's helpers as well
    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(dir) = &command.current_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &command.env {
        cmd.env(key, value);
    }

    cmd.spawn().map_err(|source| ExecError::Spawn {
        program: command.program.display().to_string(),
        source,
    })
}

/// Write the prompt on a separate task so a child that floods its output
/// pipes before reading stdin cannot deadlock us
pub(crate) fn feed_stdin(child: &mut Child, input: Option<&str>) -> Option<JoinHandle<()>> {
    let mut stdin = child.stdin.take()?;
    let data = input?.to_string();
    Some(tokio::spawn(async move {
        if let Err(e) = stdin.write_all(data.as_bytes()).await {
            // The child may legitimately exit without reading everything
            log::debug!("[Executor] Failed to write stdin: {}", e);
        }
        let _ = stdin.shutdown().await;
    }))
}

/// Read a pipe to EOF on its own task
pub(crate) fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                log::debug!("[Executor] Pipe read ended with error: {}", e);
            }
        }
        buf
    })
}

/// Join both pipe readers, abandoning them if the context finishes first
///
/// A helper the CLI left behind can keep a pipe open long after the CLI
/// itself exited.
pub(crate) async fn join_pipes<A, B>(
    ctx: &RunContext,
    first: JoinHandle<A>,
    second: JoinHandle<B>,
) -> Result<(A, B), ExecError>
where
    A: Default,
    B: Default,
{
    let abort_first = first.abort_handle();
    let abort_second = second.abort_handle();
    tokio::select! {
        (a, b) = async { tokio::join!(first, second) } => {
            Ok((a.unwrap_or_default(), b.unwrap_or_default()))
        }
        err = ctx.done() => {
            abort_first.abort();
            abort_second.abort();
            Err(ExecError::from_context(&err))
        }
    }
}

/// Kill the whole process tree and reap the child
pub(crate) async fn kill_child(child: &mut Child) {
    if let Some(pid) = child.id() {
        if let Err(e) = signal::kill(pid) {
            log::debug!("[Executor] Failed to kill process group {}: {}", pid, e);
        }
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Kill whatever the exited CLI left running in its process group
pub(crate) fn kill_leftovers(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    match signal::kill(pid) {
        Ok(true) => log::debug!("[Executor] Killed processes left behind by pid {}", pid),
        Ok(false) => {}
        Err(e) => log::debug!("[Executor] Failed to clean up process group {}: {}", pid, e),
    }
}

/// Whether the pid belongs to a running (not zombie) process
pub(crate) fn is_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
        .process(pid)
        .map(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .unwrap_or(false)
}

pub(crate) fn exit_result(status: ExitStatus) -> Result<(), ExecError> {
    if status.success() {
        Ok(())
    } else {
        Err(ExecError::ExitStatus {
            code: status.code(),
        })
    }
}

#[cfg(unix)]
pub(crate) mod signal {
    use super::ExecError;
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    use std::io;

    // Children lead their own process group (see spawn_command)
    fn send(pid: u32, sig: Signal) -> Result<bool, ExecError> {
        let Ok(raw) = i32::try_from(pid) else {
            return Ok(false);
        };
        match killpg(Pid::from_raw(raw), sig) {
            Ok(()) => Ok(true),
            // Already gone
            Err(Errno::ESRCH) => Ok(false),
            Err(errno) => Err(ExecError::Io(io::Error::from(errno))),
        }
    }

    /// SIGTERM the process group; Ok(false) when it no longer exists
    pub fn terminate(pid: u32) -> Result<bool, ExecError> {
        send(pid, Signal::SIGTERM)
    }

    pub fn kill(pid: u32) -> Result<bool, ExecError> {
        send(pid, Signal::SIGKILL)
    }
}

#[cfg(not(unix))]
pub(crate) mod signal {
    use super::ExecError;

    // kill_on_drop handles cleanup on platforms without POSIX signals
    pub fn terminate(_pid: u32) -> Result<bool, ExecError> {
        Ok(false)
    }

    pub fn kill(_pid: u32) -> Result<bool, ExecError> {
        Ok(false)
    }
}
