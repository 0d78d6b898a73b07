// Runner configuration

pub mod loader;

pub use loader::ConfigLoader;

use crate::models::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Timeout applied when neither the request nor the config sets one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Top-level configuration for all runners
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    #[serde(default)]
    pub claude: AgentConfig,
    #[serde(default)]
    pub gemini: AgentConfig,
    #[serde(default)]
    pub codex: AgentConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl RunnerConfig {
    pub fn agent(&self, agent: AgentType) -> &AgentConfig {
        match agent {
            AgentType::Claude => &self.claude,
            AgentType::Gemini => &self.gemini,
            AgentType::Codex => &self.codex,
        }
    }

    pub fn agent_mut(&mut self, agent: AgentType) -> &mut AgentConfig {
        match agent {
            AgentType::Claude => &mut self.claude,
            AgentType::Gemini => &mut self.gemini,
            AgentType::Codex => &mut self.codex,
        }
    }
}

/// Per-CLI settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Model used when a request leaves the model empty
    #[serde(rename = "defaultModel", alias = "default_model", default)]
    pub default_model: Option<String>,
    #[serde(rename = "timeoutSecs", alias = "timeout_secs", default)]
    pub timeout_secs: Option<u64>,
    /// Spending cap passed to CLIs that support one
    #[serde(rename = "maxBudgetUsd", alias = "max_budget_usd", default)]
    pub max_budget_usd: Option<f64>,
    /// Program plus leading arguments replacing the vendor binary,
    /// e.g. ["npx", "@google/gemini-cli"]
    #[serde(rename = "cliCommand", alias = "cli_command", default)]
    pub cli_command: Vec<String>,
    #[serde(rename = "modelAliases", alias = "model_aliases", default)]
    pub model_aliases: HashMap<String, String>,
    /// Extra environment for the spawned CLI
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl AgentConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Retry policy for a single agent/model pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(rename = "maxAttempts", alias = "max_attempts", default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(rename = "initialDelayMs", alias = "initial_delay_ms", default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(rename = "maxDelayMs", alias = "max_delay_ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(rename = "backoffMultiplier", alias = "backoff_multiplier", default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based): initial * multiplier^(attempt-1), capped
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Cross-model and cross-agent fallback policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Also walk the chains of `fallback_agents` after the primary agent
    #[serde(rename = "crossAgent", alias = "cross_agent", default)]
    pub cross_agent: bool,
    #[serde(rename = "maxAttemptsPerModel", alias = "max_attempts_per_model", default = "default_attempts_per_model")]
    pub max_attempts_per_model: u32,
    /// Ordered model list per agent identifier, best first
    #[serde(rename = "modelChains", alias = "model_chains", default)]
    pub model_chains: HashMap<String, Vec<String>>,
    #[serde(rename = "fallbackAgents", alias = "fallback_agents", default)]
    pub fallback_agents: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_attempts_per_model() -> u32 {
    2
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cross_agent: false,
            max_attempts_per_model: default_attempts_per_model(),
            model_chains: HashMap::new(),
            fallback_agents: Vec::new(),
        }
    }
}
