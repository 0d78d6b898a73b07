// Activity events derived from streamed agent output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Reading,
    Writing,
    Thinking,
    Planning,
    Implementing,
    Verifying,
    Analyzing,
    Searching,
    Executing,
}

impl ActivityType {
    /// Coarse phase markers, the only events shown at low verbosity
    pub fn is_phase(&self) -> bool {
        matches!(
            self,
            ActivityType::Planning
                | ActivityType::Implementing
                | ActivityType::Verifying
                | ActivityType::Analyzing
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub activity_type: ActivityType,
    pub message: String,
    /// File path, command or query the activity targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl ActivityEvent {
    pub fn new(activity_type: ActivityType, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            activity_type,
            message: message.into(),
            file: None,
            phase: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    #[default]
    Medium,
    High,
}

impl Verbosity {
    pub fn allows(&self, activity_type: ActivityType) -> bool {
        match self {
            Verbosity::Low => activity_type.is_phase(),
            Verbosity::Medium => activity_type != ActivityType::Thinking,
            Verbosity::High => true,
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Verbosity::Low),
            "medium" | "" => Ok(Verbosity::Medium),
            "high" => Ok(Verbosity::High),
            other => Err(format!("Unknown verbosity: {}", other)),
        }
    }
}

pub type ActivityCallback = Arc<dyn Fn(ActivityEvent) + Send + Sync>;

/// Progress reporting settings; providing these switches runners to streaming mode
#[derive(Clone)]
pub struct ActivityOptions {
    pub callback: ActivityCallback,
    pub verbosity: Verbosity,
}

impl ActivityOptions {
    pub fn new(callback: ActivityCallback, verbosity: Verbosity) -> Self {
        Self {
            callback,
            verbosity,
        }
    }

    /// Deliver an event if the verbosity policy lets it through
    pub fn deliver(&self, event: ActivityEvent) -> bool {
        if !self.verbosity.allows(event.activity_type) {
            return false;
        }
        (self.callback)(event);
        true
    }
}

impl fmt::Debug for ActivityOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityOptions")
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

const IDLE_PHASES: [(ActivityType, &str, &str); 3] = [
    (ActivityType::Analyzing, "Analyzing...", "analyzing"),
    (ActivityType::Planning, "Planning...", "planning"),
    (ActivityType::Implementing, "Implementing...", "implementing"),
];

/// Placeholder event emitted while the agent is silent, rotating by `tick`
pub fn idle_event(tick: usize) -> ActivityEvent {
    let (activity_type, message, phase) = IDLE_PHASES[tick % IDLE_PHASES.len()];
    ActivityEvent::new(activity_type, message).with_phase(phase)
}
