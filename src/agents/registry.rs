use crate::agents::context::RunContext;
use crate::agents::errors::AgentError;
use crate::agents::providers::create_runner;
use crate::agents::runner::{AgentRunner, RunnerOptions};
use crate::config::RunnerConfig;
use crate::models::{AIRequest, AIResult, AgentType};
use crate::utils::{read_lock_recover, write_lock_recover};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry mapping agent identifiers to runners
#[derive(Default)]
pub struct AgentRegistry {
    runners: RwLock<HashMap<String, Arc<dyn AgentRunner>>>,
}

impl AgentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a runner for every supported CLI
    pub fn with_defaults(config: &RunnerConfig, options: RunnerOptions) -> Self {
        let registry = Self::new();
        for agent in AgentType::all() {
            registry.register(create_runner(*agent, config, options.clone()));
        }
        registry
    }

    /// Register a runner under its own name, replacing any previous one
    pub fn register(&self, runner: Arc<dyn AgentRunner>) {
        let name = runner.name().to_string();
        log::debug!("[AgentRegistry] Registering runner '{}'", name);
        write_lock_recover(&self.runners).insert(name, runner);
    }

    pub fn get(&self, agent: &str) -> Result<Arc<dyn AgentRunner>, AgentError> {
        read_lock_recover(&self.runners)
            .get(agent)
            .cloned()
            .ok_or_else(|| AgentError::AgentNotFound(agent.to_string()))
    }

    pub fn has(&self, agent: &str) -> bool {
        read_lock_recover(&self.runners).contains_key(agent)
    }

    /// Registered identifiers, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = read_lock_recover(&self.runners).keys().cloned().collect();
        names.sort();
        names
    }
}

/// Dispatches each request to the runner registered for its agent
pub struct MultiRunner {
    registry: Arc<AgentRegistry>,
}

impl MultiRunner {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    fn runner_for(&self, request: &AIRequest) -> Result<Arc<dyn AgentRunner>, AgentError> {
        let agent = request.agent.trim();
        if agent.is_empty() {
            return Err(AgentError::AgentNotSpecified);
        }
        self.registry.get(agent)
    }
}

#[async_trait]
impl AgentRunner for MultiRunner {
    fn name(&self) -> &str {
        "multi"
    }

    async fn run(&self, ctx: &RunContext, request: &AIRequest) -> Result<AIResult, AgentError> {
        let runner = self.runner_for(request)?;
        runner.run(ctx, request).await
    }

    /// Terminate every registered runner's process
    async fn terminate_process(&self) -> Result<(), AgentError> {
        let runners: Vec<Arc<dyn AgentRunner>> =
            read_lock_recover(&self.registry.runners).values().cloned().collect();
        for runner in runners {
            runner.terminate_process().await?;
        }
        Ok(())
    }
}
