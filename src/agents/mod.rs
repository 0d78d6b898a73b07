// Agent CLI execution, parsing, retry and fallback

pub mod activity;
pub mod base_runner;
pub mod classifier;
pub mod context;
pub mod errors;
pub mod executor;
pub mod fallback;
pub mod format_parsers;
pub mod models;
pub mod path_resolver;
pub mod providers;
pub mod rate_limiter;
pub mod registry;
pub mod response_parsers;
pub mod runner;

// Re-export for convenience
pub use activity::{ActivityCallback, ActivityEvent, ActivityOptions, ActivityType, Verbosity};
pub use base_runner::{BaseRunner, Sleeper, TokioSleeper};
pub use context::RunContext;
pub use errors::{AgentError, FailureClass};
pub use executor::{
    BufferedExecutor, CommandExecutor, CommandSpec, ExecError, ExecOutput, ProcessTracker,
    StreamingExecutor,
};
pub use fallback::{ChainEntry, FallbackEvent, FallbackRunner};
pub use providers::{create_runner, ClaudeRunner, CodexRunner, GeminiRunner};
pub use registry::{AgentRegistry, MultiRunner};
pub use runner::{AgentRunner, LogSink, RunnerOptions};
// Note: RateLimitDetector and CliPathResolver are reachable via their modules
