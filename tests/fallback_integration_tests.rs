// Fallback runner driving real provider runners
#![cfg(unix)]

mod common;

use common::{init_logger, FakeCli};
use ralph_runner_lib::agents::{AgentError, AgentRegistry, AgentRunner, FallbackRunner, RunContext, RunnerOptions};
use ralph_runner_lib::config::{FallbackConfig, RunnerConfig};
use ralph_runner_lib::AIRequest;
use std::collections::HashMap;
use std::sync::Arc;

fn fallback_runner(config: &RunnerConfig) -> FallbackRunner {
    let registry = AgentRegistry::with_defaults(config, RunnerOptions::default());
    FallbackRunner::new(Arc::new(registry), config.fallback.clone(), RunnerOptions::default())
}

#[tokio::test]
async fn test_malformed_response_advances_to_next_model() {
    init_logger();
    let gemini = FakeCli::new(
        r#"case "$*" in
  *gemini-2.5-pro*) printf 'not json at all' ;;
  *) printf '%s' '{"response":"flash answered","stats":{"turns":1}}' ;;
esac"#,
    );
    let mut chains = HashMap::new();
    chains.insert("gemini".to_string(), vec!["pro".to_string(), "flash".to_string()]);
    let config = RunnerConfig {
        gemini: gemini.config(),
        fallback: FallbackConfig {
            model_chains: chains,
            ..Default::default()
        },
        ..Default::default()
    };

    let result = fallback_runner(&config)
        .run(&RunContext::new(), &AIRequest::new("gemini", "Explain").with_model("pro"))
        .await
        .unwrap();

    assert_eq!(result.output, "flash answered");
    let calls = gemini.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].ends_with("--model gemini-2.5-pro"));
    assert!(calls[1].ends_with("--model gemini-2.5-flash"));
}

#[tokio::test]
async fn test_cross_agent_fallback() {
    init_logger();
    let claude = FakeCli::new("exit 0");
    let codex = FakeCli::new(r#"printf '%s' '{"success":true,"output":"codex did it"}'"#);
    let config = RunnerConfig {
        claude: claude.config(),
        codex: codex.config(),
        fallback: FallbackConfig {
            cross_agent: true,
            fallback_agents: vec!["codex".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    let runner = fallback_runner(&config);

    let result = runner
        .run(&RunContext::new(), &AIRequest::new("claude", "Ship it"))
        .await
        .unwrap();

    assert_eq!(result.output, "codex did it");
    // Empty output is a fallback trigger: one try, no retries
    assert_eq!(claude.calls().len(), 1);
    assert_eq!(codex.calls().len(), 1);

    let history = runner.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from.agent, "claude");
    assert_eq!(history[0].to.as_ref().map(|e| e.agent.as_str()), Some("codex"));
}

#[tokio::test]
async fn test_missing_worktree_is_not_retried_across_chain() {
    let claude = FakeCli::new("exit 0");
    let mut chains = HashMap::new();
    chains.insert("claude".to_string(), vec!["opus".to_string(), "sonnet".to_string()]);
    let config = RunnerConfig {
        claude: claude.config(),
        fallback: FallbackConfig {
            model_chains: chains,
            ..Default::default()
        },
        ..Default::default()
    };

    let request = AIRequest::new("claude", "go").with_work_dir(claude.path().join("missing"));
    let err = fallback_runner(&config)
        .run(&RunContext::new(), &request)
        .await
        .unwrap_err();

    assert!(err.is_worktree_not_found());
    assert!(!matches!(err, AgentError::FallbacksExhausted { .. }));
    assert!(claude.calls().is_empty());
}
