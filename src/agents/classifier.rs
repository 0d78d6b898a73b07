// Error classification driving the retry and fallback loops
//
// The three predicates are independent: an error may stop the retry loop
// and still advance the fallback chain.

use super::errors::AgentError;

const NON_RETRYABLE_PATTERNS: &[&str] = &[
    "authentication",
    "api key",
    "api_key",
    "unauthorized",
    "failed to parse",
    "invalid json",
    "unexpected end of json",
    "not found",
    "executable file not found",
    "no such file or directory",
    "chdir",
    "permission denied",
    "read-only file system",
];

const FALLBACK_PATTERNS: &[&str] = &[
    "invalid format",
    "unexpected format",
    "parse error",
    "malformed response",
    "not in expected format",
];

const NON_RECOVERABLE_PATTERNS: &[&str] = &[
    "authentication",
    "api key",
    "unauthorized",
    "forbidden",
    "invalid credentials",
];

fn matches_any(err: &AgentError, patterns: &[&str]) -> bool {
    let message = err.to_string().to_lowercase();
    patterns.iter().any(|pattern| message.contains(pattern))
}

/// Whether the retry loop should try the same command again
pub fn is_retryable(err: Option<&AgentError>) -> bool {
    let Some(err) = err else {
        return false;
    };

    if err.is_cancelled()
        || err.is_timed_out()
        || err.is_worktree_not_found()
        || err.is_empty_response()
        || err.is_invalid_response_format()
    {
        return false;
    }

    // Structured vendor answers and caller mistakes will not change on retry
    if err.chain().any(|e| {
        matches!(
            e,
            AgentError::Reported { .. }
                | AgentError::InvalidRequest { .. }
                | AgentError::AgentNotFound(_)
                | AgentError::AgentNotSpecified
        )
    }) {
        return false;
    }

    !matches_any(err, NON_RETRYABLE_PATTERNS)
}

/// Whether the fallback loop should move on to the next chain entry
pub fn is_fallback_trigger(err: Option<&AgentError>) -> bool {
    let Some(err) = err else {
        return false;
    };

    err.is_invalid_response_format() || err.is_empty_response() || matches_any(err, FALLBACK_PATTERNS)
}

/// Whether every remaining retry and fallback attempt should be abandoned
pub fn is_non_recoverable(err: Option<&AgentError>) -> bool {
    let Some(err) = err else {
        return false;
    };

    err.is_cancelled() || err.is_worktree_not_found() || matches_any(err, NON_RECOVERABLE_PATTERNS)
}
