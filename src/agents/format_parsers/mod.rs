// Stream-json parsers for agent CLIs
//
// Each CLI emits its own NDJSON dialect when run in streaming mode. A parser
// turns one line into a typed event, maps tool invocations to activity
// events, and converts the terminal result event into a StreamResult.
// Parsers keep per-invocation state (session id, accumulated text) and are
// created fresh for every process run.

pub mod claude;
pub mod gemini;
pub mod tools;

pub use claude::{ClaudeEvent, ClaudeStreamParser};
pub use gemini::{GeminiEvent, GeminiStreamParser};
pub use tools::ToolAction;

use crate::agents::activity::ActivityEvent;
use crate::models::AIResult;

/// One decoded stream line, tagged by dialect
#[derive(Debug, Clone, PartialEq)]
pub enum VendorEvent {
    Claude(ClaudeEvent),
    Gemini(GeminiEvent),
}

/// Unified view of a terminal "result" event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamResult {
    pub success: bool,
    pub output: String,
    pub session_id: String,
    pub duration_ms: u64,
    pub num_turns: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub error: Option<String>,
}

impl From<StreamResult> for AIResult {
    fn from(stream: StreamResult) -> Self {
        let error = if stream.success {
            None
        } else {
            Some(
                stream
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "agent reported an unsuccessful result".to_string()),
            )
        };
        AIResult {
            success: stream.success,
            output: stream.output,
            session_id: stream.session_id,
            duration_ms: stream.duration_ms,
            num_turns: stream.num_turns,
            cost_usd: stream.cost_usd,
            error,
        }
    }
}

pub trait StreamParser: Send {
    /// Decode one line; blank or invalid JSON yields None and never aborts the stream
    fn parse_line(&mut self, line: &str) -> Option<VendorEvent>;

    fn is_result_event(&self, event: &VendorEvent) -> bool;

    /// Convert the terminal event, using any state accumulated so far
    fn to_result(&self, event: &VendorEvent) -> Option<StreamResult>;

    /// Activity events for tool invocations (or reasoning) carried by the event
    fn to_activity_events(&self, event: &VendorEvent) -> Vec<ActivityEvent>;

    fn session_id(&self) -> Option<&str>;
}
