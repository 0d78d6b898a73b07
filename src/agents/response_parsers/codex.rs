// Codex `exec --json` response decoding
//
// Codex prints either a single summary object or, on newer releases, a JSONL
// stream of thread/turn/item events. Both shapes are accepted; a summary
// object printed after log lines is taken from the last line.

use super::{decode_json, failure_text, first_non_empty};
use crate::agents::errors::AgentError;
use crate::models::{AIResult, AgentType};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct CodexResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    last_message: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default, alias = "thread_id")]
    session_id: Option<String>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default, alias = "turns")]
    num_turns: u32,
    #[serde(default, alias = "total_cost_usd")]
    cost_usd: f64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_detail: Option<CodexErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct CodexErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl CodexErrorDetail {
    fn render(&self) -> Option<String> {
        match (self.code.as_deref(), self.message.as_deref()) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (None, Some(message)) => Some(message.to_string()),
            (Some(code), None) => Some(code.to_string()),
            (None, None) => None,
        }
    }
}

impl CodexResponse {
    fn into_result(self, stderr: &[u8]) -> AIResult {
        let success = self
            .success
            .unwrap_or(self.error.is_none() && self.error_detail.is_none());
        let output = first_non_empty(&[
            self.output.as_ref(),
            self.last_message.as_ref(),
            self.message.as_ref(),
            self.result.as_ref(),
        ]);
        let error = if success {
            None
        } else {
            failure_text(
                self.error_detail.as_ref().and_then(CodexErrorDetail::render),
                self.error.as_ref(),
                stderr,
            )
            .or_else(|| Some("Codex reported an error".to_string()))
        };

        AIResult {
            success,
            output,
            session_id: self.session_id.unwrap_or_default(),
            duration_ms: self.duration_ms,
            num_turns: self.num_turns,
            cost_usd: self.cost_usd,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted {
        #[serde(default)]
        thread_id: String,
    },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: CodexItem },
    #[serde(rename = "turn.completed")]
    TurnCompleted {},
    #[serde(rename = "turn.failed")]
    TurnFailed {
        #[serde(default)]
        error: Option<CodexErrorDetail>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CodexItem {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub fn parse_response(stdout: &[u8], stderr: &[u8]) -> Result<AIResult, AgentError> {
    let whole_error = match decode_json::<CodexResponse>(AgentType::Codex, stdout) {
        Ok(response) => return Ok(response.into_result(stderr)),
        Err(err) => err,
    };
    if whole_error.is_empty_response() {
        return Err(whole_error);
    }

    let text = String::from_utf8_lossy(stdout);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(whole_error);
    }

    if let Some(result) = fold_events(&lines, stderr) {
        return Ok(result);
    }

    match lines.last().map(|line| serde_json::from_str::<CodexResponse>(line)) {
        Some(Ok(response)) => Ok(response.into_result(stderr)),
        _ => Err(whole_error),
    }
}

fn fold_events(lines: &[&str], stderr: &[u8]) -> Option<AIResult> {
    let events: Vec<CodexEvent> = lines
        .iter()
        .filter_map(|line| serde_json::from_str::<CodexEvent>(line).ok())
        .filter(|event| !matches!(event, CodexEvent::Other))
        .collect();
    if events.is_empty() {
        return None;
    }

    let mut result = AIResult::default();
    let mut failure: Option<String> = None;
    for event in events {
        match event {
            CodexEvent::ThreadStarted { thread_id } => result.session_id = thread_id,
            CodexEvent::ItemCompleted { item } if item.kind == "agent_message" => {
                if let Some(text) = item.text.filter(|t| !t.trim().is_empty()) {
                    result.output = text;
                }
            }
            CodexEvent::TurnCompleted {} => result.num_turns += 1,
            CodexEvent::TurnFailed { error } => {
                failure = Some(
                    error
                        .as_ref()
                        .and_then(CodexErrorDetail::render)
                        .unwrap_or_else(|| "turn failed".to_string()),
                );
            }
            CodexEvent::Error { message } if !message.is_empty() => failure = Some(message),
            _ => {}
        }
    }

    result.success = failure.is_none();
    if !result.success {
        result.error = failure_text(failure, None, stderr);
    }
    Some(result)
}
