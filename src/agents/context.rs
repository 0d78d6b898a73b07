// Cancellation and deadline scope for a single run

use super::errors::AgentError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline.
///
/// Every suspension point in a run (process wait, retry backoff, fallback
/// advance) observes the context it was handed. Child contexts created with
/// [`RunContext::with_timeout`] are cancelled together with their parent and
/// never outlive the parent's deadline.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one owned by a shutdown handler
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child scope that also expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check: the error this context is finished with, if any
    pub fn err(&self) -> Option<AgentError> {
        if self.token.is_cancelled() {
            return Some(AgentError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(AgentError::TimedOut),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> AgentError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => AgentError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => AgentError::TimedOut,
                }
            }
            None => {
                self.token.cancelled().await;
                AgentError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_context_has_no_error() {
        let ctx = RunContext::new();
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_child() {
        let parent = RunContext::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        parent.cancel();

        assert!(matches!(child.err(), Some(AgentError::Cancelled)));
        assert!(matches!(child.done().await, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_reach_parent() {
        let parent = RunContext::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        child.cancel();

        assert!(child.err().is_some());
        assert!(parent.err().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = RunContext::new().with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());
        assert!(matches!(ctx.done().await, AgentError::TimedOut));
        assert!(matches!(ctx.err(), Some(AgentError::TimedOut)));
    }

    #[tokio::test]
    async fn test_child_keeps_earlier_parent_deadline() {
        let parent = RunContext::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(600));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
