// Gemini CLI runner

use super::{base_command, compose_prompt, is_streaming, run_vendor, selected_model, VendorCli};
use crate::agents::base_runner::{BaseRunner, Sleeper};
use crate::agents::context::RunContext;
use crate::agents::errors::AgentError;
use crate::agents::executor::{BufferedExecutor, CommandSpec, ParserFactory};
use crate::agents::format_parsers::{GeminiStreamParser, StreamParser};
use crate::agents::response_parsers::gemini;
use crate::agents::runner::{AgentRunner, RunnerOptions};
use crate::config::{AgentConfig, RetryConfig};
use crate::models::{AIRequest, AIResult, AgentType, PermissionMode};
use async_trait::async_trait;
use std::sync::Arc;

pub struct GeminiRunner {
    base: BaseRunner,
    executor: Arc<BufferedExecutor>,
}

impl GeminiRunner {
    pub fn new(config: AgentConfig, retry: RetryConfig, options: RunnerOptions) -> Self {
        Self {
            base: BaseRunner::new(AgentType::Gemini, config, retry, options),
            executor: Arc::new(BufferedExecutor::new()),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.base = self.base.with_sleeper(sleeper);
        self
    }
}

impl VendorCli for GeminiRunner {
    fn base(&self) -> &BaseRunner {
        &self.base
    }

    fn executor(&self) -> &BufferedExecutor {
        &self.executor
    }

    fn build_command(&self, request: &AIRequest) -> Result<CommandSpec, AgentError> {
        let format = if is_streaming(&self.base) {
            "stream-json"
        } else {
            "json"
        };
        let mut command = base_command(&self.base)?.args(["--output-format", format]);

        if let Some(model) = selected_model(&self.base, request) {
            command = command.args(["--model".to_string(), model]);
        }

        // Plan mode keeps the CLI's default approval behaviour
        command = match request.permission_mode {
            PermissionMode::Default | PermissionMode::Plan => command,
            PermissionMode::AcceptEdits => command.args(["--approval-mode", "auto_edit"]),
            PermissionMode::BypassPermissions => command.arg("--yolo"),
        };

        if let Some(dir) = &request.work_dir {
            command = command.current_dir(dir);
        }
        // No system prompt flag; it leads the stdin text instead
        Ok(command.stdin(compose_prompt(request, true)))
    }

    fn decode(&self, stdout: &[u8], stderr: &[u8]) -> Result<AIResult, AgentError> {
        gemini::parse_response(stdout, stderr)
    }

    fn stream_parser(&self) -> Option<ParserFactory> {
        Some(Arc::new(|| Box::new(GeminiStreamParser::new()) as Box<dyn StreamParser>))
    }
}

#[async_trait]
impl AgentRunner for GeminiRunner {
    fn name(&self) -> &str {
        AgentType::Gemini.as_str()
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
