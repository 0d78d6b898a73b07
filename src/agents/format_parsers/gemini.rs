// Gemini CLI stream-json parsing
//
// `gemini --output-format stream-json` emits init, message (optionally as
// deltas), tool_use, tool_result, error and a final result event with
// token statistics. Assistant text only arrives through message events, so
// the parser concatenates it for the final result.

use super::{StreamParser, StreamResult, ToolAction, VendorEvent};
use crate::agents::activity::ActivityEvent;
use crate::agents::response_parsers::gemini::GeminiError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeminiEvent {
    Init {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Message {
        #[serde(default)]
        role: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        delta: bool,
    },
    ToolUse {
        #[serde(default)]
        tool_name: String,
        #[serde(default)]
        tool_id: String,
        #[serde(default)]
        parameters: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_id: String,
        #[serde(default)]
        status: String,
    },
    Error {
        #[serde(default)]
        severity: String,
        #[serde(default)]
        message: String,
    },
    Result {
        #[serde(default)]
        status: String,
        #[serde(default)]
        error: Option<GeminiError>,
        #[serde(default)]
        stats: GeminiStats,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeminiStats {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub tool_calls: u32,
}

#[derive(Debug, Default)]
pub struct GeminiStreamParser {
    session_id: Option<String>,
    assistant_text: String,
    turns: u32,
    last_error: Option<String>,
}

impl GeminiStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assistant text received so far
    pub fn assistant_text(&self) -> &str {
        &self.assistant_text
    }
}

impl StreamParser for GeminiStreamParser {
    fn parse_line(&mut self, line: &str) -> Option<VendorEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let event: GeminiEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                log::trace!("[GeminiStreamParser] Skipping unparseable line: {}", e);
                return None;
            }
        };

        match &event {
            GeminiEvent::Init { session_id, .. } => {
                if let Some(id) = session_id.as_ref().filter(|id| !id.is_empty()) {
                    self.session_id = Some(id.clone());
                }
            }
            GeminiEvent::Message {
                role,
                content,
                delta,
            } if role == "assistant" => {
                // A full message starts a new turn; deltas extend the current one
                if !*delta && !self.assistant_text.is_empty() {
                    self.assistant_text.push('\n');
                }
                if !*delta || self.turns == 0 {
                    self.turns += 1;
                }
                self.assistant_text.push_str(content);
            }
            GeminiEvent::Error { message, .. } if !message.is_empty() => {
                self.last_error = Some(message.clone());
            }
            _ => {}
        }

        Some(VendorEvent::Gemini(event))
    }

    fn is_result_event(&self, event: &VendorEvent) -> bool {
        matches!(event, VendorEvent::Gemini(GeminiEvent::Result { .. }))
    }

    fn to_result(&self, event: &VendorEvent) -> Option<StreamResult> {
        let VendorEvent::Gemini(GeminiEvent::Result {
            status,
            error,
            stats,
        }) = event
        else {
            return None;
        };

        let success = status == "success" && error.is_none();
        let error = if success {
            None
        } else {
            error
                .as_ref()
                .map(|e| e.to_string())
                .or_else(|| self.last_error.clone())
                .or_else(|| Some(format!("status: {}", status)))
        };

        Some(StreamResult {
            success,
            output: self.assistant_text.clone(),
            session_id: self.session_id.clone().unwrap_or_default(),
            duration_ms: stats.duration_ms,
            num_turns: self.turns,
            input_tokens: stats.input_tokens,
            output_tokens: stats.output_tokens,
            total_tokens: if stats.total_tokens > 0 {
                stats.total_tokens
            } else {
                stats.input_tokens + stats.output_tokens
            },
            cost_usd: 0.0,
            error,
        })
    }

    fn to_activity_events(&self, event: &VendorEvent) -> Vec<ActivityEvent> {
        match event {
            VendorEvent::Gemini(GeminiEvent::ToolUse {
                tool_name,
                parameters,
                ..
            }) => vec![ToolAction::from_gemini(tool_name).to_activity(parameters)],
            _ => Vec::new(),
        }
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::activity::ActivityType;

    fn feed(parser: &mut GeminiStreamParser, lines: &[&str]) -> Vec<VendorEvent> {
        lines.iter().filter_map(|line| parser.parse_line(line)).collect()
    }

    #[test]
    fn test_full_stream() {
        let mut parser = GeminiStreamParser::new();
        let events = feed(
            &mut parser,
            &[
                r#"{"type":"init","timestamp":"2025-10-10T12:00:00Z","session_id":"g-42","model":"gemini-2.5-pro"}"#,
                r#"{"type":"message","role":"user","content":"fix it"}"#,
                r#"{"type":"message","role":"assistant","content":"Working ","delta":true}"#,
                r#"{"type":"tool_use","tool_name":"write_file","tool_id":"w1","parameters":{"file_path":"out.txt","content":"x"}}"#,
                r#"{"type":"tool_result","tool_id":"w1","status":"success","output":""}"#,
                r#"{"type":"message","role":"assistant","content":"on it.","delta":true}"#,
                r#"{"type":"result","status":"success","stats":{"total_tokens":300,"input_tokens":200,"output_tokens":100,"duration_ms":1500,"tool_calls":1}}"#,
            ],
        );
        assert_eq!(events.len(), 7);

        let activities = parser.to_activity_events(&events[3]);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::Writing);
        assert_eq!(activities[0].file.as_deref(), Some("out.txt"));

        let last = events.last().unwrap();
        assert!(parser.is_result_event(last));
        let result = parser.to_result(last).unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Working on it.");
        assert_eq!(result.session_id, "g-42");
        assert_eq!(result.total_tokens, 300);
        assert_eq!(result.duration_ms, 1500);
    }

    #[test]
    fn test_user_messages_not_accumulated() {
        let mut parser = GeminiStreamParser::new();
        feed(&mut parser, &[r#"{"type":"message","role":"user","content":"secret prompt"}"#]);
        assert_eq!(parser.assistant_text(), "");
    }

    #[test]
    fn test_full_messages_separate_turns() {
        let mut parser = GeminiStreamParser::new();
        feed(
            &mut parser,
            &[
                r#"{"type":"message","role":"assistant","content":"first"}"#,
                r#"{"type":"message","role":"assistant","content":"second"}"#,
            ],
        );
        assert_eq!(parser.assistant_text(), "first\nsecond");
    }

    #[test]
    fn test_error_result_uses_structured_error() {
        let mut parser = GeminiStreamParser::new();
        let events = feed(
            &mut parser,
            &[r#"{"type":"result","status":"error","error":{"type":"FatalToolExecutionError","message":"disk full","code":28}}"#],
        );
        let result = parser.to_result(&events[0]).unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("FatalToolExecutionError (code 28): disk full")
        );
    }

    #[test]
    fn test_error_result_falls_back_to_error_event() {
        let mut parser = GeminiStreamParser::new();
        let events = feed(
            &mut parser,
            &[
                r#"{"type":"error","severity":"error","message":"quota exhausted"}"#,
                r#"{"type":"result","status":"error"}"#,
            ],
        );
        let result = parser.to_result(&events[1]).unwrap();
        assert_eq!(result.error.as_deref(), Some("quota exhausted"));
    }

    #[test]
    fn test_unknown_tool_and_missing_params() {
        let mut parser = GeminiStreamParser::new();
        let events = feed(
            &mut parser,
            &[r#"{"type":"tool_use","tool_name":"list_directory","tool_id":"l1"}"#],
        );
        let activities = parser.to_activity_events(&events[0]);
        assert_eq!(activities[0].activity_type, ActivityType::Analyzing);
        assert_eq!(activities[0].message, "Using list_directory");
        assert_eq!(activities[0].file, None);
    }

    #[test]
    fn test_garbage_lines_dropped() {
        let mut parser = GeminiStreamParser::new();
        assert!(parser.parse_line("Loaded cached credentials.").is_none());
        assert!(parser.parse_line("{\"type\":").is_none());
    }
}
