// Claude `--output-format json` response decoding

use super::{decode_json, failure_text, first_non_empty};
use crate::agents::errors::AgentError;
use crate::models::{AIResult, AgentType};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    subtype: String,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    num_turns: u32,
    #[serde(default, alias = "cost_usd")]
    total_cost_usd: f64,
    /// API error payload surfaced by the CLI
    #[serde(default)]
    error: Option<ClaudeApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ClaudeApiError {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ClaudeApiError {
    fn render(&self) -> Option<String> {
        match (self.kind.as_deref(), self.message.as_deref()) {
            (Some(kind), Some(message)) => Some(format!("{}: {}", kind, message)),
            (None, Some(message)) => Some(message.to_string()),
            (Some(kind), None) => Some(kind.to_string()),
            (None, None) => None,
        }
    }
}

pub fn parse_response(stdout: &[u8], stderr: &[u8]) -> Result<AIResult, AgentError> {
    let response: ClaudeResponse = decode_json(AgentType::Claude, stdout)?;

    let success = !response.is_error
        && response.error.is_none()
        && (response.subtype.is_empty() || response.subtype == "success");
    let output = first_non_empty(&[
        response.result.as_ref(),
        response.text.as_ref(),
        response.content.as_ref(),
    ]);

    let error = if success {
        None
    } else {
        // On failure the CLI puts its explanation in `result`
        failure_text(
            response.error.as_ref().and_then(ClaudeApiError::render),
            response.result.as_ref(),
            stderr,
        )
        .or_else(|| Some(response.subtype.clone()).filter(|s| !s.is_empty()))
        .or_else(|| Some("Claude reported an error".to_string()))
    };

    Ok(AIResult {
        success,
        output,
        session_id: response.session_id.unwrap_or_default(),
        duration_ms: response.duration_ms,
        num_turns: response.num_turns,
        cost_usd: response.total_cost_usd,
        error,
    })
}
