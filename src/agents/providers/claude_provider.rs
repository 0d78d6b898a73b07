// Claude Code CLI runner

use super::{base_command, compose_prompt, is_streaming, run_vendor, selected_model, VendorCli};
use crate::agents::base_runner::{BaseRunner, Sleeper};
use crate::agents::context::RunContext;
use crate::agents::errors::AgentError;
use crate::agents::executor::{BufferedExecutor, CommandSpec, ExecError, ParserFactory};
use crate::agents::format_parsers::{ClaudeStreamParser, StreamParser};
use crate::agents::response_parsers::claude;
use crate::agents::runner::{AgentRunner, RunnerOptions};
use crate::config::{AgentConfig, RetryConfig};
use crate::models::{AIRequest, AIResult, AgentType, PermissionMode};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ClaudeRunner {
    base: BaseRunner,
    executor: Arc<BufferedExecutor>,
}

impl ClaudeRunner {
    pub fn new(config: AgentConfig, retry: RetryConfig, options: RunnerOptions) -> Self {
        Self {
            base: BaseRunner::new(AgentType::Claude, config, retry, options),
            executor: Arc::new(BufferedExecutor::new()),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.base = self.base.with_sleeper(sleeper);
        self
    }

    /// Request budget capped by the configured maximum
    fn budget(&self, request: &AIRequest) -> Option<f64> {
        let requested = (request.max_budget_usd > 0.0).then_some(request.max_budget_usd);
        match (requested, self.base.config().max_budget_usd) {
            (Some(requested), Some(cap)) => Some(requested.min(cap)),
            (requested, cap) => requested.or(cap),
        }
    }
}

impl VendorCli for ClaudeRunner {
    fn base(&self) -> &BaseRunner {
        &self.base
    }

    fn executor(&self) -> &BufferedExecutor {
        &self.executor
    }

    fn build_command(&self, request: &AIRequest) -> Result<CommandSpec, AgentError> {
        let mut command = base_command(&self.base)?.arg("--print").arg("--output-format");
        command = if is_streaming(&self.base) {
            // stream-json requires --verbose in print mode
            command.args(["stream-json", "--verbose"])
        } else {
            command.arg("json")
        };

        if let Some(model) = selected_model(&self.base, request) {
            command = command.args(["--model".to_string(), model]);
        }

        command = match request.permission_mode {
            PermissionMode::Default => command,
            PermissionMode::Plan => command.args(["--permission-mode", "plan"]),
            PermissionMode::AcceptEdits => command.args(["--permission-mode", "acceptEdits"]),
            PermissionMode::BypassPermissions => command.arg("--dangerously-skip-permissions"),
        };

        if request.max_turns > 0 {
            command = command.args(["--max-turns".to_string(), request.max_turns.to_string()]);
        }
        if let Some(budget) = self.budget(request) {
            command = command.args(["--max-budget-usd".to_string(), budget.to_string()]);
        }
        if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            command = command.args(["--append-system-prompt", system]);
        }

        if let Some(dir) = &request.work_dir {
            command = command.current_dir(dir);
        }
        Ok(command.stdin(compose_prompt(request, false)))
    }

    fn decode(&self, stdout: &[u8], stderr: &[u8]) -> Result<AIResult, AgentError> {
        claude::parse_response(stdout, stderr)
    }

    fn stream_parser(&self) -> Option<ParserFactory> {
        Some(Arc::new(|| Box::new(ClaudeStreamParser::new()) as Box<dyn StreamParser>))
    }

    fn annotate_salvaged(&self, result: &mut AIResult, err: &ExecError) {
        let parsed = result.error.take().unwrap_or_default();
        result.error = Some(format!("{} ({})", parsed, err));
    }
}

#[async_trait]
impl AgentRunner for ClaudeRunner {
    fn name(&self) -> &str {
        AgentType::Claude.as_str()
    }

    async fn run(&self, ctx: &RunContext, request: &AIRequest) -> Result<AIResult, AgentError> {
        run_vendor(self, ctx, request).await
    }

    async fn terminate_process(&self) -> Result<(), AgentError> {
        self.executor
            .terminate_process()
            .await
            .map_err(|e| self.base.wrap_error(&e, &[]))
    }
}
