// Tool invocation -> activity mapping shared by both stream dialects

use crate::agents::activity::{ActivityEvent, ActivityType};
use crate::utils::truncate_with_ellipsis;
use serde_json::Value;

/// Shell commands longer than this are cut in activity messages
const COMMAND_PREVIEW_CHARS: usize = 50;

/// What a tool call does, independent of vendor naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    Read,
    Edit,
    Write,
    Search,
    FindFiles,
    Execute,
    SubAgent,
    Fetch,
    WebSearch,
    Other(String),
}

impl ToolAction {
    /// Claude Code tool names
    pub fn from_claude(name: &str) -> Self {
        match name {
            "Read" => ToolAction::Read,
            "Edit" | "MultiEdit" | "NotebookEdit" => ToolAction::Edit,
            "Write" => ToolAction::Write,
            "Grep" => ToolAction::Search,
            "Glob" => ToolAction::FindFiles,
            "Bash" => ToolAction::Execute,
            "Task" => ToolAction::SubAgent,
            "WebFetch" => ToolAction::Fetch,
            "WebSearch" => ToolAction::WebSearch,
            other => ToolAction::Other(other.to_string()),
        }
    }

    /// Gemini CLI tool names, including the names newer releases use
    pub fn from_gemini(name: &str) -> Self {
        match name {
            "read_file" | "read_many_files" => ToolAction::Read,
            "edit_file" | "replace" => ToolAction::Edit,
            "write_file" => ToolAction::Write,
            "search_files" | "grep_search" | "search_file_content" => ToolAction::Search,
            "find_files" | "glob" => ToolAction::FindFiles,
            "shell" | "run_shell_command" | "execute_command" => ToolAction::Execute,
            "fetch_url" | "web_fetch" => ToolAction::Fetch,
            "web_search" | "google_web_search" => ToolAction::WebSearch,
            other => ToolAction::Other(other.to_string()),
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        match self {
            ToolAction::Read | ToolAction::Fetch => ActivityType::Reading,
            ToolAction::Edit | ToolAction::Write => ActivityType::Writing,
            ToolAction::Search | ToolAction::FindFiles | ToolAction::WebSearch => {
                ActivityType::Searching
            }
            ToolAction::Execute => ActivityType::Executing,
            ToolAction::SubAgent | ToolAction::Other(_) => ActivityType::Analyzing,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ToolAction::Read => "Reading".to_string(),
            ToolAction::Edit => "Editing".to_string(),
            ToolAction::Write => "Writing".to_string(),
            ToolAction::Search => "Searching".to_string(),
            ToolAction::FindFiles => "Finding files".to_string(),
            ToolAction::Execute => "Executing".to_string(),
            ToolAction::SubAgent => "Running sub-agent".to_string(),
            ToolAction::Fetch => "Fetching".to_string(),
            ToolAction::WebSearch => "Searching web".to_string(),
            ToolAction::Other(name) => format!("Using {}", name),
        }
    }

    /// Parameter keys holding the target, in lookup order
    fn target_keys(&self) -> &'static [&'static str] {
        match self {
            ToolAction::Read => &["file_path", "absolute_path", "path", "paths"],
            ToolAction::Edit | ToolAction::Write => {
                &["file_path", "notebook_path", "absolute_path", "path"]
            }
            ToolAction::Search => &["pattern", "query", "path"],
            ToolAction::FindFiles => &["pattern", "path"],
            ToolAction::Execute => &["command"],
            ToolAction::SubAgent => &["description", "subagent_type"],
            ToolAction::Fetch => &["url"],
            ToolAction::WebSearch => &["query"],
            ToolAction::Other(_) => &["file_path", "path"],
        }
    }

    /// Build the activity event; a missing or malformed payload only loses the target
    pub fn to_activity(&self, params: &Value) -> ActivityEvent {
        let target = target_from(params, self.target_keys()).map(|t| match self {
            ToolAction::Execute => truncate_with_ellipsis(&t, COMMAND_PREVIEW_CHARS),
            _ => t,
        });
        ActivityEvent::new(self.activity_type(), self.message()).with_file(target)
    }
}

fn target_from(params: &Value, keys: &[&str]) -> Option<String> {
    // Some CLIs double-encode the input object as a JSON string
    let decoded;
    let params = match params {
        Value::String(raw) => {
            decoded = serde_json::from_str::<Value>(raw).ok()?;
            &decoded
        }
        other => other,
    };

    let object = params.as_object()?;
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    })
}
