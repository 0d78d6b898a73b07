// Clippy allows for reasonable defaults
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::derivable_impls)] // Explicit Default impls can be clearer
#![allow(clippy::unnecessary_map_or)] // map_or can be clearer than alternatives

//! Execution and resilience core for coding-agent CLIs.
//!
//! Runs Claude, Gemini and Codex as subprocesses, decodes their JSON and
//! NDJSON output into one result shape, reports live activity, and retries
//! or falls back across models and agents when a run fails.

// Module declarations
pub mod agents;
pub mod config;
pub mod models;
mod utils;

pub use agents::{
    AgentError, AgentRegistry, AgentRunner, FallbackRunner, MultiRunner, RunContext,
    RunnerOptions,
};
pub use config::{ConfigLoader, RunnerConfig};
pub use models::*;
