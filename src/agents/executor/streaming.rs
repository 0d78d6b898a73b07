// Streaming executor: live NDJSON parsing with activity reporting
//
// Per invocation: one task drains the non-protocol pipe into a buffer, one
// task scans the protocol pipe line by line, and a watchdog emits placeholder
// progress while the agent is silent. All three are joined (or aborted on
// cancellation) before execute returns. The pid can be reported to the
// runner's shared ProcessTracker so terminate_process works in this mode too.

use super::{
    drain, exit_result, feed_stdin, join_pipes, kill_child, kill_leftovers, spawn_command,
    CommandExecutor, CommandSpec, ExecError, ExecOutput, ProcessTracker,
};
use crate::agents::activity::{idle_event, ActivityEvent, ActivityOptions};
use crate::agents::context::RunContext;
use crate::agents::format_parsers::{StreamParser, StreamResult};
use crate::agents::rate_limiter::RateLimitDetector;
use crate::utils::lock_mutex_recover;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lines up to this size are read without reallocation
const LINE_BUFFER_BYTES: usize = 1024 * 1024;
const IDLE_THRESHOLD: Duration = Duration::from_secs(5);
const WATCHDOG_TICK: Duration = Duration::from_secs(1);

/// Builds a fresh parser for each process run
pub type ParserFactory = Arc<dyn Fn() -> Box<dyn StreamParser> + Send + Sync>;

type BoxedPipe = Box<dyn AsyncRead + Unpin + Send>;

/// Which pipe carries the NDJSON protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamChannel {
    #[default]
    Stdout,
    Stderr,
}

pub struct StreamingExecutor {
    parser_factory: Option<ParserFactory>,
    channel: StreamChannel,
    activity: ActivityOptions,
    tracker: Option<Arc<ProcessTracker>>,
    idle_threshold: Duration,
    tick: Duration,
}

impl StreamingExecutor {
    pub fn new(activity: ActivityOptions) -> Self {
        Self {
            parser_factory: None,
            channel: StreamChannel::Stdout,
            activity,
            tracker: None,
            idle_threshold: IDLE_THRESHOLD,
            tick: WATCHDOG_TICK,
        }
    }

    pub fn with_parser(mut self, factory: ParserFactory) -> Self {
        self.parser_factory = Some(factory);
        self
    }

    pub fn with_channel(mut self, channel: StreamChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Report the running pid so the tracker can terminate it
    pub fn with_tracker(mut self, tracker: Arc<ProcessTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Silence allowed before placeholder progress is emitted
    pub fn with_idle_threshold(mut self, threshold: Duration, tick: Duration) -> Self {
        self.idle_threshold = threshold;
        self.tick = tick;
        self
    }
}

/// Delivers events and remembers when the caller last heard from us
struct Emitter {
    options: ActivityOptions,
    last_emit: Mutex<Instant>,
}

impl Emitter {
    fn new(options: ActivityOptions) -> Self {
        Self {
            options,
            last_emit: Mutex::new(Instant::now()),
        }
    }

    fn emit(&self, event: ActivityEvent) {
        if self.options.deliver(event) {
            *lock_mutex_recover(&self.last_emit) = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        lock_mutex_recover(&self.last_emit).elapsed()
    }
}

#[derive(Default)]
struct ScanOutcome {
    raw: Vec<u8>,
    result: Option<StreamResult>,
}

async fn scan_protocol(
    pipe: Option<BoxedPipe>,
    mut parser: Option<Box<dyn StreamParser>>,
    emitter: Arc<Emitter>,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let Some(pipe) = pipe else {
        return outcome;
    };

    let mut reader = BufReader::with_capacity(LINE_BUFFER_BYTES, pipe);
    let mut line = Vec::with_capacity(4096);
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                // Raw bytes are kept verbatim for the final decode
                outcome.raw.extend_from_slice(&line);

                let Some(parser) = parser.as_mut() else {
                    continue;
                };
                let text = String::from_utf8_lossy(&line);
                let Some(event) = parser.parse_line(&text) else {
                    continue;
                };
                for activity in parser.to_activity_events(&event) {
                    emitter.emit(activity);
                }
                if parser.is_result_event(&event) {
                    if let Some(result) = parser.to_result(&event) {
                        outcome.result = Some(result);
                    }
                }
            }
            Err(e) => {
                log::warn!("[StreamingExecutor] Protocol pipe read failed: {}", e);
                break;
            }
        }
    }
    outcome
}

async fn run_watchdog(emitter: Arc<Emitter>, stop: CancellationToken, threshold: Duration, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut rotation = 0usize;
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                if emitter.idle_for() >= threshold {
                    emitter.emit(idle_event(rotation));
                    rotation += 1;
                }
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for StreamingExecutor {
    async fn execute(&self, ctx: &RunContext, command: &CommandSpec) -> ExecOutput {
        if let Some(err) = ctx.err() {
            return ExecOutput::failed(ExecError::from_context(&err));
        }

        let mut child = match spawn_command(command) {
            Ok(child) => child,
            Err(e) => return ExecOutput::failed(e),
        };
        let pid = child.id();
        if let Some(tracker) = &self.tracker {
            tracker.track(pid);
        }
        log::debug!(
            "[StreamingExecutor] Started pid {:?}: {}",
            pid,
            command.describe()
        );

        let writer = feed_stdin(&mut child, command.stdin.as_deref());
        let stdout = child.stdout.take().map(|p| Box::new(p) as BoxedPipe);
        let stderr = child.stderr.take().map(|p| Box::new(p) as BoxedPipe);
        let (protocol_pipe, capture_pipe) = match self.channel {
            StreamChannel::Stdout => (stdout, stderr),
            StreamChannel::Stderr => (stderr, stdout),
        };

        let emitter = Arc::new(Emitter::new(self.activity.clone()));
        let parser = self.parser_factory.as_ref().map(|factory| factory());
        let capture_task = drain(capture_pipe);
        let scan_task = tokio::spawn(scan_protocol(protocol_pipe, parser, emitter.clone()));
        let stop_watchdog = CancellationToken::new();
        let watchdog_task = tokio::spawn(run_watchdog(
            emitter,
            stop_watchdog.clone(),
            self.idle_threshold,
            self.tick,
        ));

        let status = tokio::select! {
            status = child.wait() => status.map_err(ExecError::from).and_then(exit_result),
            err = ctx.done() => {
                kill_child(&mut child).await;
                Err(ExecError::from_context(&err))
            }
        };
        if let Some(tracker) = &self.tracker {
            tracker.release(pid);
        }
        if let Some(writer) = writer {
            writer.abort();
        }

        if matches!(status, Err(ref e) if e.is_context_error()) {
            stop_watchdog.cancel();
            let _ = watchdog_task.await;
            scan_task.abort();
            capture_task.abort();
            return ExecOutput::failed(status.err().unwrap_or(ExecError::Cancelled));
        }

        kill_leftovers(pid);
        let joined = join_pipes(ctx, scan_task, capture_task).await;
        stop_watchdog.cancel();
        let _ = watchdog_task.await;
        let (scanned, captured) = match joined {
            Ok(joined) => joined,
            Err(err) => {
                log::warn!(
                    "[StreamingExecutor] Output of pid {:?} still open after exit: {}",
                    pid,
                    err
                );
                return ExecOutput::failed(err);
            }
        };

        let (stdout, stderr) = match self.channel {
            StreamChannel::Stdout => (scanned.raw, captured),
            StreamChannel::Stderr => (captured, scanned.raw),
        };

        if let Some(hit) = RateLimitDetector::new().detect(&String::from_utf8_lossy(&stderr)) {
            log::warn!(
                "[StreamingExecutor] Rate limit signalled on stderr ({:?}): {}",
                hit.kind,
                hit.matched
            );
        }

        ExecOutput {
            stdout,
            stderr,
            status,
            stream: scanned.result,
        }
    }
}
