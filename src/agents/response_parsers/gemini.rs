// Gemini `--output-format json` response decoding

use super::{decode_json, failure_text, first_non_empty};
use crate::agents::errors::AgentError;
use crate::models::{AIResult, AgentType};
use serde::Deserialize;
use std::fmt;

/// Gemini error payload; the CLI reports either a bare string or an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawGeminiError")]
pub struct GeminiError {
    pub kind: Option<String>,
    pub message: Option<String>,
    pub code: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGeminiError {
    Text(String),
    Detail {
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<i64>,
    },
}

impl From<RawGeminiError> for GeminiError {
    fn from(raw: RawGeminiError) -> Self {
        let non_blank = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        match raw {
            RawGeminiError::Text(message) => GeminiError {
                kind: None,
                message: non_blank(Some(message)),
                code: None,
            },
            RawGeminiError::Detail {
                kind,
                message,
                code,
            } => GeminiError {
                kind: non_blank(kind),
                message: non_blank(message),
                code,
            },
        }
    }
}

// "Type (code N): Message", dropping whichever parts are absent
impl fmt::Display for GeminiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = self.kind.clone().unwrap_or_default();
        if let Some(code) = self.code {
            if !prefix.is_empty() {
                prefix.push(' ');
            }
            prefix.push_str(&format!("(code {})", code));
        }

        match (prefix.is_empty(), self.message.as_deref()) {
            (false, Some(message)) => write!(f, "{}: {}", prefix, message),
            (true, Some(message)) => f.write_str(message),
            (false, None) => f.write_str(&prefix),
            (true, None) => f.write_str("unknown error"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<GeminiError>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    stats: Option<GeminiResponseStats>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponseStats {
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    turns: u32,
}

pub fn parse_response(stdout: &[u8], stderr: &[u8]) -> Result<AIResult, AgentError> {
    let response: GeminiResponse = decode_json(AgentType::Gemini, stdout)?;

    let success = response.success.unwrap_or(true) && response.error.is_none();
    let output = first_non_empty(&[
        response.response.as_ref(),
        response.output.as_ref(),
        response.text.as_ref(),
        response.content.as_ref(),
    ]);

    let error = if success {
        None
    } else {
        failure_text(response.error.as_ref().map(|e| e.to_string()), None, stderr)
            .or_else(|| Some("Gemini reported an error".to_string()))
    };

    let stats = response.stats.unwrap_or_default();
    Ok(AIResult {
        success,
        output,
        session_id: response.session_id.unwrap_or_default(),
        duration_ms: response.duration_ms.unwrap_or(stats.duration_ms),
        num_turns: stats.turns,
        cost_usd: 0.0,
        error,
    })
}
