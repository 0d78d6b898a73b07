// Error taxonomy for agent runs
//
// Every vendor-specific variant carries the AgentType, so callers can
// categorize failures by matching instead of comparing message text.

use crate::models::{AIResult, AgentType};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure class reported in user-facing execution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    NotFound,
    ApiKey,
    RateLimited,
    Generic,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureClass::NotFound => "CLI not found",
            FailureClass::ApiKey => "API key error",
            FailureClass::RateLimited => "rate limited",
            FailureClass::Generic => "execution failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{agent}: empty response from CLI")]
    EmptyResponse { agent: AgentType },

    #[error("{agent}: invalid response format: failed to parse JSON: {source}")]
    InvalidResponseFormat {
        agent: AgentType,
        #[source]
        source: serde_json::Error,
    },

    #[error("worktree not found: {}", display_path(.path))]
    WorktreeNotFound { path: PathBuf },

    #[error("{agent} {class}: {message}{}", stderr_suffix(.stderr))]
    Execution {
        agent: AgentType,
        class: FailureClass,
        message: String,
        stderr: String,
    },

    /// The CLI answered with a structured failure; the decoded result rides along
    #[error("{agent} reported failure: {}", reported_message(.result))]
    Reported {
        agent: AgentType,
        result: Box<AIResult>,
    },

    #[error("{agent}: max retries exceeded after {attempts} attempts: {source}")]
    MaxRetriesExceeded {
        agent: AgentType,
        attempts: u32,
        #[source]
        source: Box<AgentError>,
    },

    #[error("all fallbacks exhausted after {attempts} attempts: {source}")]
    FallbacksExhausted {
        attempts: usize,
        #[source]
        source: Box<AgentError>,
    },

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent must be specified in the request")]
    AgentNotSpecified,

    #[error("{agent}: invalid request: {message}")]
    InvalidRequest { agent: AgentType, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out")]
    TimedOut,
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\nstderr: {}", stderr)
    }
}

fn display_path(path: &std::path::Path) -> String {
    path.display().to_string()
}

fn reported_message(result: &AIResult) -> &str {
    result.error.as_deref().unwrap_or("unknown error")
}

impl AgentError {
    /// Walk this error and every AgentError it wraps, outermost first
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    fn wrapped(&self) -> Option<&AgentError> {
        match self {
            AgentError::MaxRetriesExceeded { source, .. }
            | AgentError::FallbacksExhausted { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Vendor of the innermost error that names one
    pub fn agent(&self) -> Option<AgentType> {
        self.chain().find_map(|err| match err {
            AgentError::EmptyResponse { agent }
            | AgentError::InvalidResponseFormat { agent, .. }
            | AgentError::Execution { agent, .. }
            | AgentError::Reported { agent, .. }
            | AgentError::MaxRetriesExceeded { agent, .. }
            | AgentError::InvalidRequest { agent, .. } => Some(*agent),
            _ => None,
        })
    }

    pub fn is_empty_response(&self) -> bool {
        self.chain()
            .any(|err| matches!(err, AgentError::EmptyResponse { .. }))
    }

    pub fn is_invalid_response_format(&self) -> bool {
        self.chain()
            .any(|err| matches!(err, AgentError::InvalidResponseFormat { .. }))
    }

    pub fn is_worktree_not_found(&self) -> bool {
        self.chain()
            .any(|err| matches!(err, AgentError::WorktreeNotFound { .. }))
    }

    pub fn is_cancelled(&self) -> bool {
        self.chain().any(|err| matches!(err, AgentError::Cancelled))
    }

    pub fn is_timed_out(&self) -> bool {
        self.chain().any(|err| matches!(err, AgentError::TimedOut))
    }

    /// Structured failure decoded from the CLI, if any layer carries one
    pub fn reported_result(&self) -> Option<&AIResult> {
        self.chain().find_map(|err| match err {
            AgentError::Reported { result, .. } => Some(result.as_ref()),
            _ => None,
        })
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        self.chain().find_map(|err| match err {
            AgentError::Execution { class, .. } => Some(*class),
            _ => None,
        })
    }
}

pub struct Chain<'a> {
    next: Option<&'a AgentError>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a AgentError;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.wrapped();
        Some(current)
    }
}
