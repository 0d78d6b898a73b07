// Agent runner trait and construction options

use super::activity::ActivityOptions;
use super::context::RunContext;
use super::errors::AgentError;
use crate::models::{AIRequest, AIResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Optional observer for runner lifecycle messages, in addition to `log`
pub type LogSink = Arc<dyn Fn(log::Level, &str) + Send + Sync>;

/// Everything a runner can be configured with at construction time
#[derive(Clone, Default)]
pub struct RunnerOptions {
    /// Receives attempt, retry, fallback and termination messages
    pub log_sink: Option<LogSink>,
    /// Enables streaming execution with live activity events
    pub activity: Option<ActivityOptions>,
}

impl RunnerOptions {
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn with_activity(mut self, activity: ActivityOptions) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Write to the `log` facade and mirror to the sink if one is set
    pub(crate) fn emit(&self, level: log::Level, message: &str) {
        log::log!(level, "{}", message);
        if let Some(sink) = &self.log_sink {
            sink(level, message);
        }
    }
}

impl fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("log_sink", &self.log_sink.is_some())
            .field("activity", &self.activity)
            .finish()
    }
}

/// Runs a request against one or more agent CLIs.
///
/// Every call returns either a successful result or an error, never a
/// partially successful result.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Identifier used for registry lookups and log prefixes
    fn name(&self) -> &str;

    async fn run(&self, ctx: &RunContext, request: &AIRequest) -> Result<AIResult, AgentError>;

    /// Stop whatever process the runner currently has in flight, in either
    /// buffered or streaming mode. Succeeds when nothing is running.
    async fn terminate_process(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_mirrors_to_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = RunnerOptions::default().with_log_sink(Arc::new(move |level: log::Level, msg: &str| {
            sink.lock().unwrap().push((level, msg.to_string()));
        }));

        options.emit(log::Level::Info, "[Test] hello");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(log::Level::Info, "[Test] hello".to_string())]
        );
    }

    #[test]
    fn test_emit_without_sink_is_harmless() {
        RunnerOptions::default().emit(log::Level::Debug, "nobody listening");
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let options = RunnerOptions::default();
        assert!(format!("{:?}", options).contains("log_sink: false"));
    }
}
