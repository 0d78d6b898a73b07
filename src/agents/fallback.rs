// Model and agent fallback across a configured chain
//
// The chain is walked in order. Each entry gets up to max_attempts_per_model
// tries; a fallback-trigger error moves on immediately, a non-recoverable
// error ends the whole run.

use crate::agents::classifier::{is_fallback_trigger, is_non_recoverable};
use crate::agents::context::RunContext;
use crate::agents::errors::AgentError;
use crate::agents::registry::AgentRegistry;
use crate::agents::runner::{AgentRunner, RunnerOptions};
use crate::config::FallbackConfig;
use crate::models::{AIRequest, AIResult};
use crate::utils::lock_mutex_recover;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// One agent/model pair to try
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub agent: String,
    /// Empty means the agent's default model
    pub model: String,
}

impl ChainEntry {
    pub fn new(agent: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for ChainEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.model.is_empty() {
            write!(f, "{}", self.agent)
        } else {
            write!(f, "{}/{}", self.agent, self.model)
        }
    }
}

/// Record of one move along the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackEvent {
    pub timestamp: DateTime<Utc>,
    pub from: ChainEntry,
    pub to: Option<ChainEntry>,
    pub reason: String,
}

/// Oldest fallback events are dropped beyond this many
pub const MAX_HISTORY: usize = 100;

pub struct FallbackRunner {
    registry: Arc<AgentRegistry>,
    config: FallbackConfig,
    options: RunnerOptions,
    history: Mutex<VecDeque<FallbackEvent>>,
}

impl FallbackRunner {
    pub fn new(registry: Arc<AgentRegistry>, config: FallbackConfig, options: RunnerOptions) -> Self {
        Self {
            registry,
            config,
            options,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Recent fallback moves, oldest first, at most [`MAX_HISTORY`]
    pub fn history(&self) -> Vec<FallbackEvent> {
        lock_mutex_recover(&self.history).iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        lock_mutex_recover(&self.history).clear();
    }

    fn emit(&self, level: log::Level, message: String) {
        self.options
            .emit(level, &format!("[FallbackRunner] {}", message));
    }

    /// Ordered attempt list for a request
    pub fn build_chain(&self, request: &AIRequest) -> Vec<ChainEntry> {
        let primary = request.agent.trim();
        let models_for = |agent: &str| {
            self.config
                .model_chains
                .get(agent)
                .filter(|models| !models.is_empty())
        };

        let mut chain: Vec<ChainEntry> = match models_for(primary) {
            Some(models) => {
                let start = models
                    .iter()
                    .position(|model| *model == request.model)
                    .unwrap_or(0);
                models[start..]
                    .iter()
                    .map(|model| ChainEntry::new(primary, model.as_str()))
                    .collect()
            }
            None => vec![ChainEntry::new(primary, request.model.as_str())],
        };

        if self.config.cross_agent {
            let mut seen: HashSet<&str> = HashSet::from([primary]);
            for agent in &self.config.fallback_agents {
                let agent = agent.trim();
                if !seen.insert(agent) {
                    continue;
                }
                match models_for(agent) {
                    Some(models) => chain.extend(
                        models
                            .iter()
                            .map(|model| ChainEntry::new(agent, model.as_str())),
                    ),
                    None => chain.push(ChainEntry::new(agent, "")),
                }
            }
        }
        chain
    }

    fn record(&self, from: &ChainEntry, to: Option<&ChainEntry>, reason: &AgentError) {
        let event = FallbackEvent {
            timestamp: Utc::now(),
            from: from.clone(),
            to: to.cloned(),
            reason: reason.to_string(),
        };
        match &event.to {
            Some(next) => self.emit(
                log::Level::Warn,
                format!("Falling back from {} to {}: {}", from, next, event.reason),
            ),
            None => self.emit(
                log::Level::Error,
                format!("No fallbacks left after {}: {}", from, event.reason),
            ),
        }
        let mut history = lock_mutex_recover(&self.history);
        if history.len() >= MAX_HISTORY {
            history.pop_front();
        }
        history.push_back(event);
    }

    async fn run_chain(
        &self,
        ctx: &RunContext,
        request: &AIRequest,
    ) -> Result<AIResult, AgentError> {
        let chain = self.build_chain(request);
        self.emit(
            log::Level::Debug,
            format!(
                "Attempt chain: {}",
                chain
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ),
        );

        let max_attempts = self.config.max_attempts_per_model.max(1);
        let mut attempts = 0usize;
        let mut last_err: Option<AgentError> = None;

        for (index, entry) in chain.iter().enumerate() {
            let runner = match self.registry.get(&entry.agent) {
                Ok(runner) => runner,
                Err(err) => {
                    self.emit(log::Level::Warn, format!("Skipping {}: {}", entry, err));
                    last_err = Some(err);
                    continue;
                }
            };
            let attempt_request = request.retarget(&entry.agent, &entry.model);

            for try_number in 1..=max_attempts {
                if let Some(err) = ctx.err() {
                    return Err(err);
                }
                attempts += 1;

                match runner.run(ctx, &attempt_request).await {
                    Ok(result) => {
                        if index > 0 {
                            self.emit(log::Level::Info, format!("Succeeded with fallback {}", entry));
                        }
                        return Ok(result);
                    }
                    Err(err) if is_non_recoverable(Some(&err)) => {
                        self.emit(
                            log::Level::Error,
                            format!("Non-recoverable error from {}: {}", entry, err),
                        );
                        return Err(err);
                    }
                    Err(err) => {
                        let advance = is_fallback_trigger(Some(&err));
                        self.emit(
                            log::Level::Warn,
                            format!(
                                "{} failed (try {}/{}): {}",
                                entry, try_number, max_attempts, err
                            ),
                        );
                        last_err = Some(err);
                        if advance {
                            break;
                        }
                    }
                }
            }

            if let Some(err) = &last_err {
                self.record(entry, chain.get(index + 1), err);
            }
        }

        let source = last_err.unwrap_or_else(|| AgentError::AgentNotFound(request.agent.clone()));
        Err(AgentError::FallbacksExhausted {
            attempts,
            source: Box::new(source),
        })
    }
}

#[async_trait]
impl AgentRunner for FallbackRunner {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn run(&self, ctx: &RunContext, request: &AIRequest) -> Result<AIResult, AgentError> {
        let agent = request.agent.trim();
        if agent.is_empty() {
            return Err(AgentError::AgentNotSpecified);
        }
        // The primary agent must exist even when fallbacks could cover for it
        let primary = self.registry.get(agent)?;

        if !self.config.enabled {
            return primary.run(ctx, request).await;
        }
        self.run_chain(ctx, request).await
    }

    async fn terminate_process(&self) -> Result<(), AgentError> {
        for name in self.registry.list() {
            self.registry.get(&name)?.terminate_process().await?;
        }
        Ok(())
    }
}
