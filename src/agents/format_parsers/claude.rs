// Claude Code stream-json parsing
//
// `claude --print --output-format stream-json --verbose` emits one JSON
// object per line: a system/init event, assistant and user messages whose
// content blocks carry text, thinking and tool_use/tool_result entries, and
// a closing result event with cost and usage.

use super::{StreamParser, StreamResult, ToolAction, VendorEvent};
use crate::agents::activity::{ActivityEvent, ActivityType};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeEvent {
    System {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Assistant {
        #[serde(default)]
        message: ClaudeMessage,
        #[serde(default)]
        session_id: Option<String>,
    },
    User {
        #[serde(default)]
        message: ClaudeMessage,
    },
    Result(ClaudeResultEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClaudeMessage {
    #[serde(default, deserialize_with = "content_blocks")]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClaudeResultEvent {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub usage: ClaudeUsage,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

// User turns may carry plain text instead of a block array; unknown blocks
// must not poison the rest of the message.
fn content_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => vec![ContentBlock::Text { text }],
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or(ContentBlock::Other))
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Default)]
pub struct ClaudeStreamParser {
    session_id: Option<String>,
}

impl ClaudeStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember_session(&mut self, session_id: &Option<String>) {
        if let Some(id) = session_id.as_ref().filter(|id| !id.is_empty()) {
            self.session_id = Some(id.clone());
        }
    }
}

impl StreamParser for ClaudeStreamParser {
    fn parse_line(&mut self, line: &str) -> Option<VendorEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let event: ClaudeEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                log::trace!("[ClaudeStreamParser] Skipping unparseable line: {}", e);
                return None;
            }
        };

        match &event {
            ClaudeEvent::System { session_id, .. } | ClaudeEvent::Assistant { session_id, .. } => {
                self.remember_session(session_id)
            }
            ClaudeEvent::Result(result) => self.remember_session(&result.session_id),
            _ => {}
        }

        Some(VendorEvent::Claude(event))
    }

    fn is_result_event(&self, event: &VendorEvent) -> bool {
        matches!(event, VendorEvent::Claude(ClaudeEvent::Result(_)))
    }

    fn to_result(&self, event: &VendorEvent) -> Option<StreamResult> {
        let VendorEvent::Claude(ClaudeEvent::Result(result)) = event else {
            return None;
        };

        let success = !result.is_error && (result.subtype.is_empty() || result.subtype == "success");
        let output = result.result.clone().unwrap_or_default();
        let error = if success {
            None
        } else if !output.trim().is_empty() {
            Some(output.clone())
        } else {
            Some(result.subtype.clone())
        };

        Some(StreamResult {
            success,
            output,
            session_id: result
                .session_id
                .clone()
                .or_else(|| self.session_id.clone())
                .unwrap_or_default(),
            duration_ms: result.duration_ms,
            num_turns: result.num_turns,
            input_tokens: result.usage.input_tokens,
            output_tokens: result.usage.output_tokens,
            total_tokens: result.usage.input_tokens + result.usage.output_tokens,
            cost_usd: result.total_cost_usd,
            error,
        })
    }

    fn to_activity_events(&self, event: &VendorEvent) -> Vec<ActivityEvent> {
        let VendorEvent::Claude(ClaudeEvent::Assistant { message, .. }) = event else {
            return Vec::new();
        };

        message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { name, input, .. } => {
                    Some(ToolAction::from_claude(name).to_activity(input))
                }
                ContentBlock::Thinking { .. } => {
                    Some(ActivityEvent::new(ActivityType::Thinking, "Thinking"))
                }
                _ => None,
            })
            .collect()
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}
