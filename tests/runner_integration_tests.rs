// End-to-end runner tests against fake vendor CLIs
#![cfg(unix)]

mod common;

use async_trait::async_trait;
use common::{init_logger, FakeCli};
use ralph_runner_lib::agents::base_runner::Sleeper;
use ralph_runner_lib::agents::{
    ActivityEvent, ActivityOptions, ActivityType, AgentError, AgentRunner, ClaudeRunner,
    CodexRunner, FailureClass, GeminiRunner, RunContext, RunnerOptions, Verbosity,
};
use ralph_runner_lib::config::{AgentConfig, RetryConfig};
use ralph_runner_lib::AIRequest;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn claude(cli: &FakeCli) -> ClaudeRunner {
    ClaudeRunner::new(cli.config(), RetryConfig::default(), RunnerOptions::default())
}

#[tokio::test]
async fn test_claude_success_buffered() {
    init_logger();
    let cli = FakeCli::new(
        r#"printf '%s' '{"type":"result","subtype":"success","is_error":false,"result":"All done","session_id":"s-1","duration_ms":12,"num_turns":2,"total_cost_usd":0.01}'"#,
    );
    let mut request = AIRequest::new("claude", "Fix the failing test").with_model("sonnet");
    request.context = "cargo test fails in parser.rs".to_string();

    let result = claude(&cli)
        .run(&RunContext::new(), &request)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output, "All done");
    assert_eq!(result.session_id, "s-1");
    assert_eq!(result.num_turns, 2);

    let calls = cli.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], "--print --output-format json --model sonnet");
    assert_eq!(
        cli.stdin(),
        "Fix the failing test\n\nContext:\ncargo test fails in parser.rs"
    );
}

#[tokio::test]
async fn test_claude_salvages_error_response_on_nonzero_exit() {
    init_logger();
    let cli = FakeCli::new(
        r#"printf '%s' '{"type":"result","subtype":"error_during_execution","is_error":true,"result":"Credit balance is too low"}'
exit 1"#,
    );

    let err = claude(&cli)
        .run(&RunContext::new(), &AIRequest::new("claude", "go"))
        .await
        .unwrap_err();

    let result = err.reported_result().expect("structured failure");
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Credit balance is too low (process exited with status 1)")
    );
    // Vendor-reported failures are not retried
    assert_eq!(cli.calls().len(), 1);
}

#[tokio::test]
async fn test_transient_failures_retry_with_backoff() {
    init_logger();
    let cli = FakeCli::new("echo 'connection reset by peer' >&2\nexit 1");
    let sleeper = Arc::new(RecordingSleeper::default());
    let runner = claude(&cli).with_sleeper(sleeper.clone());

    let err = runner
        .run(&RunContext::new(), &AIRequest::new("claude", "go"))
        .await
        .unwrap_err();

    match &err {
        AgentError::MaxRetriesExceeded { attempts, source, .. } => {
            assert_eq!(*attempts, 3);
            assert_eq!(source.failure_class(), Some(FailureClass::Generic));
            assert!(source.to_string().contains("stderr: connection reset by peer"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(cli.calls().len(), 3);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn test_api_key_failure_is_not_retried() {
    let cli = FakeCli::new("echo 'Error: Invalid API key' >&2\nexit 1");
    let err = claude(&cli)
        .run(&RunContext::new(), &AIRequest::new("claude", "go"))
        .await
        .unwrap_err();

    assert_eq!(err.failure_class(), Some(FailureClass::ApiKey));
    assert_eq!(cli.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_worktree_never_spawns() {
    let cli = FakeCli::new("exit 0");
    let request =
        AIRequest::new("claude", "go").with_work_dir(cli.path().join("does-not-exist"));

    let err = claude(&cli)
        .run(&RunContext::new(), &request)
        .await
        .unwrap_err();

    assert!(err.is_worktree_not_found());
    assert!(cli.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_context_never_spawns() {
    let cli = FakeCli::new("exit 0");
    let ctx = RunContext::new();
    ctx.cancel();

    for runner in [
        Arc::new(claude(&cli)) as Arc<dyn AgentRunner>,
        Arc::new(GeminiRunner::new(cli.config(), RetryConfig::default(), RunnerOptions::default())),
        Arc::new(CodexRunner::new(cli.config(), RetryConfig::default(), RunnerOptions::default())),
    ] {
        let err = runner.run(&ctx, &AIRequest::new(runner.name(), "go")).await.unwrap_err();
        assert!(err.is_cancelled());
    }
    assert!(cli.calls().is_empty());
}

#[tokio::test]
async fn test_request_timeout_stops_process() {
    let cli = FakeCli::new("sleep 30");
    let request = AIRequest::new("claude", "go").with_timeout(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let err = claude(&cli)
        .run(&RunContext::new(), &request)
        .await
        .unwrap_err();

    assert!(err.is_timed_out());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(cli.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_cli_is_not_found() {
    let config = AgentConfig {
        cli_command: vec!["/nonexistent/bin/claude".to_string()],
        ..Default::default()
    };
    let runner = ClaudeRunner::new(config, RetryConfig::default(), RunnerOptions::default());
    let err = runner
        .run(&RunContext::new(), &AIRequest::new("claude", "go"))
        .await
        .unwrap_err();

    assert_eq!(err.failure_class(), Some(FailureClass::NotFound));
    assert!(err.to_string().starts_with("claude CLI not found"));
}

#[tokio::test]
async fn test_gemini_structured_error() {
    let cli = FakeCli::new(
        r#"printf '%s' '{"response":"","error":{"type":"ApiError","message":"Quota exceeded","code":429}}'"#,
    );
    let runner = GeminiRunner::new(cli.config(), RetryConfig::default(), RunnerOptions::default());

    let err = runner
        .run(&RunContext::new(), &AIRequest::new("gemini", "go").with_model("pro"))
        .await
        .unwrap_err();

    let result = err.reported_result().expect("structured failure");
    assert_eq!(result.error.as_deref(), Some("ApiError (code 429): Quota exceeded"));
    assert_eq!(
        cli.calls()[0],
        "--output-format json --model gemini-2.5-pro"
    );
}

#[tokio::test]
async fn test_gemini_empty_output_is_empty_response() {
    let cli = FakeCli::new("exit 0");
    let runner = GeminiRunner::new(cli.config(), RetryConfig::default(), RunnerOptions::default());
    let err = runner
        .run(&RunContext::new(), &AIRequest::new("gemini", "go"))
        .await
        .unwrap_err();

    assert!(err.is_empty_response());
    assert_eq!(cli.calls().len(), 1);
}

#[tokio::test]
async fn test_codex_jsonl_events() {
    let cli = FakeCli::new(
        r#"echo '{"type":"thread.started","thread_id":"t-42"}'
echo '{"type":"item.completed","item":{"type":"reasoning","text":"thinking"}}'
echo '{"type":"item.completed","item":{"type":"agent_message","text":"Patched src/lib.rs"}}'
echo '{"type":"turn.completed","usage":{"input_tokens":10,"output_tokens":5}}'"#,
    );
    let runner = CodexRunner::new(cli.config(), RetryConfig::default(), RunnerOptions::default());
    let mut request = AIRequest::new("codex", "Patch it");
    request.system_prompt = Some("Only edit src/".to_string());

    let result = runner.run(&RunContext::new(), &request).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, "Patched src/lib.rs");
    assert_eq!(result.session_id, "t-42");
    assert_eq!(result.num_turns, 1);
    assert_eq!(cli.calls()[0], "exec --json --skip-git-repo-check -");
    assert_eq!(cli.stdin(), "Only edit src/\n\nPatch it");
}

#[tokio::test]
async fn test_claude_streaming_reports_activity() {
    init_logger();
    let cli = FakeCli::new(
        r#"echo '{"type":"system","subtype":"init","session_id":"s-7","model":"claude-sonnet"}'
echo '{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"src/main.rs"}}]}}'
echo '{"type":"result","subtype":"success","is_error":false,"result":"Read it","num_turns":1}'"#,
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let activity = ActivityOptions::new(
        Arc::new(move |event: ActivityEvent| sink.lock().unwrap().push(event)),
        Verbosity::Medium,
    );
    let runner = ClaudeRunner::new(
        cli.config(),
        RetryConfig::default(),
        RunnerOptions::default().with_activity(activity),
    );

    let result = runner
        .run(&RunContext::new(), &AIRequest::new("claude", "Read main"))
        .await
        .unwrap();

    assert_eq!(result.output, "Read it");
    assert_eq!(result.session_id, "s-7");
    assert_eq!(
        cli.calls()[0],
        "--print --output-format stream-json --verbose"
    );
    let events = events.lock().unwrap();
    let reads: Vec<_> = events
        .iter()
        .filter(|e| e.activity_type == ActivityType::Reading)
        .collect();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].file.as_deref(), Some("src/main.rs"));
}

#[tokio::test]
async fn test_log_sink_receives_lifecycle_messages() {
    let cli = FakeCli::new(r#"printf '%s' '{"result":"ok"}'"#);
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let options = RunnerOptions::default().with_log_sink(Arc::new(
        move |_level: log::Level, message: &str| sink.lock().unwrap().push(message.to_string()),
    ));
    let runner = ClaudeRunner::new(cli.config(), RetryConfig::default(), options);

    runner
        .run(&RunContext::new(), &AIRequest::new("claude", "go"))
        .await
        .unwrap();

    let messages = messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.starts_with("[ClaudeRunner] Running")));
    assert!(messages.iter().all(|m| !m.contains("go\n")));
}

#[tokio::test]
async fn test_terminate_process_stops_streaming_run() {
    let cli = FakeCli::new("sleep 30");
    let activity = ActivityOptions::new(Arc::new(|_event: ActivityEvent| {}), Verbosity::High);
    let retry = RetryConfig {
        max_attempts: 1,
        ..Default::default()
    };
    let runner = Arc::new(ClaudeRunner::new(
        cli.config(),
        retry,
        RunnerOptions::default().with_activity(activity),
    ));

    let background = runner.clone();
    let started = std::time::Instant::now();
    let handle = tokio::spawn(async move {
        background
            .run(&RunContext::new(), &AIRequest::new("claude", "go"))
            .await
    });

    // The script logs its arguments once it is running
    while cli.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    runner.terminate_process().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_err());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(cli.calls().len(), 1);
}
