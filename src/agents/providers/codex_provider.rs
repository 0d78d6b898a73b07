// Codex CLI runner

use super::{base_command, compose_prompt, run_vendor, selected_model, VendorCli};
use crate::agents::base_runner::{BaseRunner, Sleeper};
use crate::agents::context::RunContext;
use crate::agents::errors::AgentError;
use crate::agents::executor::{BufferedExecutor, CommandSpec, ParserFactory};
use crate::agents::response_parsers::codex;
use crate::agents::runner::{AgentRunner, RunnerOptions};
use crate::config::{AgentConfig, RetryConfig};
use crate::models::{AIRequest, AIResult, AgentType, PermissionMode};
use async_trait::async_trait;
use std::sync::Arc;

pub struct CodexRunner {
    base: BaseRunner,
    executor: Arc<BufferedExecutor>,
}

impl CodexRunner {
    pub fn new(config: AgentConfig, retry: RetryConfig, options: RunnerOptions) -> Self {
        Self {
            base: BaseRunner::new(AgentType::Codex, config, retry, options),
            executor: Arc::new(BufferedExecutor::new()),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.base = self.base.with_sleeper(sleeper);
        self
    }
}

impl VendorCli for CodexRunner {
    fn base(&self) -> &BaseRunner {
        &self.base
    }

    fn executor(&self) -> &BufferedExecutor {
        &self.executor
    }

    fn build_command(&self, request: &AIRequest) -> Result<CommandSpec, AgentError> {
        // `exec --json` emits JSONL in both modes
        let mut command =
            base_command(&self.base)?.args(["exec", "--json", "--skip-git-repo-check"]);

        if let Some(model) = selected_model(&self.base, request) {
            command = command.args(["--model".to_string(), model]);
        }

        command = match request.permission_mode {
            PermissionMode::Default => command,
            PermissionMode::Plan => command.args(["--sandbox", "read-only"]),
            PermissionMode::AcceptEdits => command.arg("--full-auto"),
            PermissionMode::BypassPermissions => {
                command.arg("--dangerously-bypass-approvals-and-sandbox")
            }
        };

        if let Some(dir) = &request.work_dir {
            command = command
                .args(["--cd".to_string(), dir.display().to_string()])
                .current_dir(dir);
        }

        // "-" reads the prompt from stdin
        Ok(command.arg("-").stdin(compose_prompt(request, true)))
    }

    fn decode(&self, stdout: &[u8], stderr: &[u8]) -> Result<AIResult, AgentError> {
        codex::parse_response(stdout, stderr)
    }

    fn stream_parser(&self) -> Option<ParserFactory> {
        None
    }
}

#[async_trait]
impl AgentRunner for CodexRunner {
    fn name(&self) -> &str {
        AgentType::Codex.as_str()
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
