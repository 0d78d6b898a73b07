// Request/result models shared by every agent runner

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Supported coding-agent CLIs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Claude,
    Gemini,
    Codex,
}

impl AgentType {
    pub fn all() -> &'static [AgentType] {
        &[AgentType::Claude, AgentType::Gemini, AgentType::Codex]
    }

    /// Identifier used in requests, config keys and registry lookups
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Claude => "claude",
            AgentType::Gemini => "gemini",
            AgentType::Codex => "codex",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentType::Claude => "Claude",
            AgentType::Gemini => "Gemini",
            AgentType::Codex => "Codex",
        }
    }

    /// Name of the vendor binary looked up on disk
    pub fn binary_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(AgentType::Claude),
            "gemini" => Ok(AgentType::Gemini),
            "codex" => Ok(AgentType::Codex),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

/// How much autonomy the agent gets over the working directory
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    /// Read-only planning
    Plan,
    AcceptEdits,
    /// Full access, no confirmation prompts
    BypassPermissions,
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "default" => Ok(PermissionMode::Default),
            "plan" | "read-only" | "readonly" => Ok(PermissionMode::Plan),
            "acceptEdits" | "accept-edits" | "accept_edits" => Ok(PermissionMode::AcceptEdits),
            "bypassPermissions" | "bypass-permissions" | "full-access" | "yolo" => {
                Ok(PermissionMode::BypassPermissions)
            }
            other => Err(format!("Unknown permission mode: {}", other)),
        }
    }
}

/// A single agent invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AIRequest {
    pub prompt: String,
    /// Registry identifier of the target agent ("claude", "gemini", "codex")
    #[serde(default)]
    pub agent: String,
    /// Model name or alias; empty selects the configured default
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub timeout: Option<Duration>,
    #[serde(default, alias = "permission_mode")]
    pub permission_mode: PermissionMode,
    #[serde(default, alias = "system_prompt")]
    pub system_prompt: Option<String>,
    #[serde(default, alias = "work_dir")]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub context: String,
    #[serde(default, alias = "max_turns")]
    pub max_turns: u32,
    #[serde(default, alias = "max_budget_usd")]
    pub max_budget_usd: f64,
}

impl AIRequest {
    pub fn new(agent: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            agent: agent.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Copy of this request retargeted at another agent/model pair
    pub fn retarget(&self, agent: &str, model: &str) -> Self {
        Self {
            agent: agent.to_string(),
            model: model.to_string(),
            ..self.clone()
        }
    }
}

/// Normalized outcome of an agent run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AIResult {
    pub success: bool,
    pub output: String,
    pub session_id: String,
    pub duration_ms: u64,
    pub num_turns: u32,
    pub cost_usd: f64,
    /// Only populated when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_round_trip() {
        for agent in AgentType::all() {
            assert_eq!(agent.as_str().parse::<AgentType>().unwrap(), *agent);
        }
        assert!("cursor".parse::<AgentType>().is_err());
        assert_eq!(" Claude ".parse::<AgentType>().unwrap(), AgentType::Claude);
    }

    #[test]
    fn test_permission_mode_aliases() {
        assert_eq!("read-only".parse::<PermissionMode>().unwrap(), PermissionMode::Plan);
        assert_eq!(
            "full-access".parse::<PermissionMode>().unwrap(),
            PermissionMode::BypassPermissions
        );
        assert_eq!("".parse::<PermissionMode>().unwrap(), PermissionMode::Default);
        assert!("sometimes".parse::<PermissionMode>().is_err());
    }

    #[test]
    fn test_retarget_only_changes_agent_and_model() {
        let request = AIRequest::new("claude", "fix the bug")
            .with_model("opus")
            .with_work_dir("/tmp/work");
        let retargeted = request.retarget("gemini", "pro");

        assert_eq!(retargeted.agent, "gemini");
        assert_eq!(retargeted.model, "pro");
        assert_eq!(retargeted.prompt, request.prompt);
        assert_eq!(retargeted.work_dir, request.work_dir);
        assert_eq!(request.agent, "claude");
    }

    #[test]
    fn test_request_deserializes_snake_case_aliases() {
        let request: AIRequest = serde_json::from_str(
            r#"{"prompt":"hi","agent":"codex","work_dir":"/tmp","max_turns":4,"permission_mode":"plan"}"#,
        )
        .unwrap();
        assert_eq!(request.max_turns, 4);
        assert_eq!(request.permission_mode, PermissionMode::Plan);
        assert_eq!(request.work_dir, Some(PathBuf::from("/tmp")));
    }
}
