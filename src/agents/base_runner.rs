// Shared retry, timeout and error-wrapping strategy for provider runners
//
// Each provider owns a BaseRunner and calls into it; nothing here knows about
// vendor command lines or response shapes.

use super::classifier::is_retryable;
use super::context::RunContext;
use super::errors::{AgentError, FailureClass};
use super::executor::{ExecError, ExecOutput};
use super::rate_limiter::RateLimitDetector;
use super::runner::RunnerOptions;
use crate::config::{AgentConfig, RetryConfig, DEFAULT_TIMEOUT};
use crate::models::{AIRequest, AIResult, AgentType};
use crate::utils::trimmed_output;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const API_KEY_PATTERNS: &[&str] = &[
    "api key",
    "api_key",
    "authentication",
    "unauthorized",
    "invalid credentials",
];

/// Waits between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct BaseRunner {
    agent: AgentType,
    config: AgentConfig,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    options: RunnerOptions,
    rate_limits: RateLimitDetector,
}

impl BaseRunner {
    pub fn new(
        agent: AgentType,
        config: AgentConfig,
        retry: RetryConfig,
        options: RunnerOptions,
    ) -> Self {
        Self {
            agent,
            config,
            retry,
            sleeper: Arc::new(TokioSleeper),
            options,
            rate_limits: RateLimitDetector::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn agent(&self) -> AgentType {
        self.agent
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    fn component(&self) -> String {
        format!("[{}Runner]", self.agent.display_name())
    }

    pub(crate) fn emit(&self, level: log::Level, message: impl AsRef<str>) {
        self.options
            .emit(level, &format!("{} {}", self.component(), message.as_ref()));
    }

    /// Request timeout, else configured timeout, else the package default
    pub fn resolve_timeout(&self, request: &AIRequest) -> Duration {
        request
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .or_else(|| self.config.timeout())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn check_work_dir(&self, request: &AIRequest) -> Result<(), AgentError> {
        match &request.work_dir {
            Some(dir) if !dir.exists() => Err(AgentError::WorktreeNotFound { path: dir.clone() }),
            _ => Ok(()),
        }
    }

    /// Everything that must hold before a process may be spawned
    pub fn preflight(&self, ctx: &RunContext, request: &AIRequest) -> Result<(), AgentError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        if request.prompt.trim().is_empty() {
            return Err(AgentError::InvalidRequest {
                agent: self.agent,
                message: "prompt cannot be empty".to_string(),
            });
        }
        if request.max_budget_usd < 0.0 {
            return Err(AgentError::InvalidRequest {
                agent: self.agent,
                message: "max_budget_usd cannot be negative".to_string(),
            });
        }
        self.check_work_dir(request)
    }

    /// Run `execute` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `execute` receives the 1-based attempt number. Cancellation is checked
    /// before every attempt and observed during backoff.
    pub async fn run_with_retry<F, Fut>(
        &self,
        ctx: &RunContext,
        mut execute: F,
    ) -> Result<AIResult, AgentError>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<AIResult, AgentError>> + Send,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            attempt += 1;

            let err = match execute(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        self.emit(
                            log::Level::Info,
                            format!("Succeeded on attempt {}/{}", attempt, max_attempts),
                        );
                    }
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !is_retryable(Some(&err)) {
                self.emit(
                    log::Level::Debug,
                    format!("Attempt {} failed permanently: {}", attempt, err),
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                self.emit(
                    log::Level::Error,
                    format!("Giving up after {} attempts: {}", attempt, err),
                );
                return Err(AgentError::MaxRetriesExceeded {
                    agent: self.agent,
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            self.emit(
                log::Level::Warn,
                format!(
                    "Retryable error on attempt {}/{}: {}. Retrying in {}ms...",
                    attempt,
                    max_attempts,
                    err,
                    delay.as_millis()
                ),
            );

            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                err = ctx.done() => return Err(err),
            }
        }
    }

    /// Turn a process-level failure into the vendor's execution error
    pub fn wrap_error(&self, err: &ExecError, stderr: &[u8]) -> AgentError {
        match err {
            ExecError::Cancelled => return AgentError::Cancelled,
            ExecError::TimedOut => return AgentError::TimedOut,
            _ => {}
        }

        let stderr = trimmed_output(stderr);
        let message = err.to_string();
        let haystack = format!("{}\n{}", message, stderr).to_lowercase();

        let class = if err.is_not_found() || haystack.contains("command not found") {
            FailureClass::NotFound
        } else if API_KEY_PATTERNS.iter().any(|p| haystack.contains(p)) {
            FailureClass::ApiKey
        } else if self.rate_limits.is_rate_limited(&stderr) {
            FailureClass::RateLimited
        } else {
            FailureClass::Generic
        };

        AgentError::Execution {
            agent: self.agent,
            class,
            message,
            stderr,
        }
    }

    /// The CLI binary could not be located; raised before any spawn
    pub fn cli_not_found(&self, program: &str) -> AgentError {
        AgentError::Execution {
            agent: self.agent,
            class: FailureClass::NotFound,
            message: format!("'{}' is not installed or not on PATH", program),
            stderr: String::new(),
        }
    }

    /// Recover the agent's own explanation from a failed run.
    ///
    /// Prefers a result captured from the protocol stream, then a decode of
    /// stdout. The returned result is always marked failed and always
    /// carries an error message.
    pub fn salvage<D>(&self, output: &ExecOutput, decode: D) -> Option<AIResult>
    where
        D: Fn(&[u8], &[u8]) -> Result<AIResult, AgentError>,
    {
        let mut result = match &output.stream {
            Some(stream) => AIResult::from(stream.clone()),
            None => decode(&output.stdout, &output.stderr).ok()?,
        };

        result.success = false;
        if result.error.as_deref().map_or(true, |e| e.trim().is_empty()) {
            let fallback = match &output.status {
                Err(err) => err.to_string(),
                Ok(()) => "unknown error".to_string(),
            };
            result.error = Some(fallback);
        }
        self.emit(
            log::Level::Warn,
            format!(
                "Salvaged structured failure from errored run: {}",
                result.error.as_deref().unwrap_or_default()
            ),
        );
        Some(result)
    }
}
