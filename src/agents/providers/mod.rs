// Provider runners for the supported agent CLIs
//
// A provider only knows its vendor's command line and response shape. The
// shared flow (preflight, timeout scope, retry, executor selection, salvage)
// lives in run_vendor and the BaseRunner it drives.

mod claude_provider;
mod codex_provider;
mod gemini_provider;

pub use claude_provider::ClaudeRunner;
pub use codex_provider::CodexRunner;
pub use gemini_provider::GeminiRunner;

use crate::agents::base_runner::BaseRunner;
use crate::agents::context::RunContext;
use crate::agents::errors::AgentError;
use crate::agents::executor::{
    BufferedExecutor, CommandExecutor, CommandSpec, ExecError, ExecOutput, ParserFactory,
    StreamChannel, StreamingExecutor,
};
use crate::agents::models::resolve_model;
use crate::agents::path_resolver::CliPathResolver;
use crate::agents::runner::{AgentRunner, RunnerOptions};
use crate::config::RunnerConfig;
use crate::models::{AIRequest, AIResult, AgentType};
use std::sync::Arc;

/// Vendor-specific half of a provider runner
pub(crate) trait VendorCli: Send + Sync {
    fn base(&self) -> &BaseRunner;

    fn executor(&self) -> &BufferedExecutor;

    fn build_command(&self, request: &AIRequest) -> Result<CommandSpec, AgentError>;

    /// Decode a buffered (non-streaming) response
    fn decode(&self, stdout: &[u8], stderr: &[u8]) -> Result<AIResult, AgentError>;

    /// Parser for streaming mode; None runs the watchdog only
    fn stream_parser(&self) -> Option<ParserFactory>;

    fn stream_channel(&self) -> StreamChannel {
        StreamChannel::Stdout
    }

    /// Hook for adjusting a result salvaged from a failed process
    fn annotate_salvaged(&self, _result: &mut AIResult, _err: &ExecError) {}
}

/// Build the runner for one agent from shared configuration
pub fn create_runner(
    agent: AgentType,
    config: &RunnerConfig,
    options: RunnerOptions,
) -> Arc<dyn AgentRunner> {
    let agent_config = config.agent(agent).clone();
    let retry = config.retry.clone();
    match agent {
        AgentType::Claude => Arc::new(ClaudeRunner::new(agent_config, retry, options)),
        AgentType::Gemini => Arc::new(GeminiRunner::new(agent_config, retry, options)),
        AgentType::Codex => Arc::new(CodexRunner::new(agent_config, retry, options)),
    }
}

/// Program (from `cli_command` or a binary lookup), leading args and env
pub(crate) fn base_command(base: &BaseRunner) -> Result<CommandSpec, AgentError> {
    let config = base.config();
    let mut command = match config.cli_command.split_first() {
        Some((program, leading)) => {
            let path = CliPathResolver::resolve_program(program)
                .ok_or_else(|| base.cli_not_found(program))?;
            CommandSpec::new(path).args(leading.iter().cloned())
        }
        None => {
            let binary = base.agent().binary_name();
            let path = CliPathResolver::resolve(base.agent())
                .ok_or_else(|| base.cli_not_found(binary))?;
            CommandSpec::new(path)
        }
    };

    if !config.env.is_empty() {
        base.emit(
            log::Level::Debug,
            format!("Injecting {} environment variables", config.env.len()),
        );
        let mut env: Vec<(String, String)> = config
            .env
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        env.sort();
        command.env = env;
    }
    Ok(command)
}

pub(crate) fn selected_model(base: &BaseRunner, request: &AIRequest) -> Option<String> {
    let config = base.config();
    resolve_model(
        base.agent(),
        &request.model,
        config.default_model.as_deref(),
        &config.model_aliases,
    )
}

/// Text written to the CLI's stdin
pub(crate) fn compose_prompt(request: &AIRequest, inline_system_prompt: bool) -> String {
    let mut text = String::new();
    if inline_system_prompt {
        if let Some(system) = request.system_prompt.as_deref().map(str::trim) {
            if !system.is_empty() {
                text.push_str(system);
                text.push_str("\n\n");
            }
        }
    }
    text.push_str(&request.prompt);
    if !request.context.trim().is_empty() {
        text.push_str("\n\nContext:\n");
        text.push_str(&request.context);
    }
    text
}

pub(crate) fn is_streaming(base: &BaseRunner) -> bool {
    base.options().activity.is_some()
}

pub(crate) async fn run_vendor<V>(
    vendor: &V,
    ctx: &RunContext,
    request: &AIRequest,
) -> Result<AIResult, AgentError>
where
    V: VendorCli + ?Sized,
{
    let base = vendor.base();
    base.preflight(ctx, request)?;

    let command = vendor.build_command(request)?;
    let timeout = base.resolve_timeout(request);
    let ctx = ctx.with_timeout(timeout);
    base.emit(
        log::Level::Info,
        format!("Running {} (timeout {:?})", command.describe(), timeout),
    );

    base.run_with_retry(&ctx, |attempt| run_attempt(vendor, &ctx, &command, attempt))
        .await
}

async fn run_attempt<V>(
    vendor: &V,
    ctx: &RunContext,
    command: &CommandSpec,
    attempt: u32,
) -> Result<AIResult, AgentError>
where
    V: VendorCli + ?Sized,
{
    let base = vendor.base();
    base.emit(log::Level::Debug, format!("Starting attempt {}", attempt));

    let output = match &base.options().activity {
        Some(activity) => {
            let mut executor = StreamingExecutor::new(activity.clone())
                .with_channel(vendor.stream_channel())
                .with_tracker(vendor.executor().tracker());
            if let Some(factory) = vendor.stream_parser() {
                executor = executor.with_parser(factory);
            }
            executor.execute(ctx, command).await
        }
        None => vendor.executor().execute(ctx, command).await,
    };

    finish(vendor, output)
}

fn finish<V>(vendor: &V, output: ExecOutput) -> Result<AIResult, AgentError>
where
    V: VendorCli + ?Sized,
{
    let base = vendor.base();
    let agent = base.agent();

    match &output.status {
        Ok(()) => {}
        Err(err) if err.is_context_error() => return Err(base.wrap_error(err, &output.stderr)),
        Err(err) => {
            let decode = |stdout: &[u8], stderr: &[u8]| vendor.decode(stdout, stderr);
            if let Some(mut result) = base.salvage(&output, decode) {
                vendor.annotate_salvaged(&mut result, err);
                return Err(AgentError::Reported {
                    agent,
                    result: Box::new(result),
                });
            }
            return Err(base.wrap_error(err, &output.stderr));
        }
    }

    let result = match output.stream {
        Some(stream) => AIResult::from(stream),
        None => vendor.decode(&output.stdout, &output.stderr)?,
    };

    if !result.success {
        return Err(AgentError::Reported {
            agent,
            result: Box::new(result),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    #[test]
    fn test_compose_prompt_appends_context() {
        let mut request = AIRequest::new("claude", "Fix the bug");
        assert_eq!(compose_prompt(&request, true), "Fix the bug");

        request.context = "src/lib.rs fails to build".to_string();
        request.system_prompt = Some("You are terse.".to_string());
        assert_eq!(
            compose_prompt(&request, false),
            "Fix the bug\n\nContext:\nsrc/lib.rs fails to build"
        );
        assert_eq!(
            compose_prompt(&request, true),
            "You are terse.\n\nFix the bug\n\nContext:\nsrc/lib.rs fails to build"
        );
    }

    #[test]
    fn test_base_command_uses_cli_command_override() {
        let config = AgentConfig {
            cli_command: vec!["sh".to_string(), "-c".to_string()],
            env: [("GEMINI_API_KEY".to_string(), "k".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let base = BaseRunner::new(
            AgentType::Gemini,
            config,
            Default::default(),
            RunnerOptions::default(),
        );

        let command = base_command(&base).unwrap();
        assert!(command.program.ends_with("sh"));
        assert_eq!(command.args, vec!["-c"]);
        assert_eq!(command.env, vec![("GEMINI_API_KEY".to_string(), "k".to_string())]);
    }

    #[test]
    fn test_base_command_missing_program_is_not_found() {
        let config = AgentConfig {
            cli_command: vec!["/no/such/dir/gemini".to_string()],
            ..Default::default()
        };
        let base = BaseRunner::new(
            AgentType::Gemini,
            config,
            Default::default(),
            RunnerOptions::default(),
        );

        let err = base_command(&base).unwrap_err();
        assert_eq!(
            err.failure_class(),
            Some(crate::agents::errors::FailureClass::NotFound)
        );
        assert!(!crate::agents::classifier::is_retryable(Some(&err)));
    }

    #[test]
    fn test_create_runner_names() {
        let config = RunnerConfig::default();
        for agent in AgentType::all() {
            let runner = create_runner(*agent, &config, RunnerOptions::default());
            assert_eq!(runner.name(), agent.as_str());
        }
    }
}
