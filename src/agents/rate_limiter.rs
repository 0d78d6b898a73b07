// Rate-limit detection over agent CLI stderr

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKind {
    /// HTTP 429 Too Many Requests
    Http429,
    RateLimit,
    QuotaExceeded,
    Overloaded,
    /// Google APIs report exhausted quota as RESOURCE_EXHAUSTED
    ResourceExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHit {
    pub kind: RateLimitKind,
    pub matched: String,
    /// Server-suggested wait, when the output carries one
    pub retry_after: Option<Duration>,
}

// Ordered: vendor-specific markers before generic wording
const PATTERN_SPECS: &[(&str, RateLimitKind)] = &[
    (r"\bRESOURCE_EXHAUSTED\b", RateLimitKind::ResourceExhausted),
    // Word boundary keeps ids like "ses_429f18" from matching
    (r"(?i)\b429\b", RateLimitKind::Http429),
    (r"(?i)rate[_\-\s]?limit(ed|ing)?", RateLimitKind::RateLimit),
    (r"(?i)too\s+many\s+requests", RateLimitKind::RateLimit),
    (r"(?i)tokens?\s+per\s+minute", RateLimitKind::RateLimit),
    (r"(?i)quota\s*(exceeded|limit)", RateLimitKind::QuotaExceeded),
    (r"(?i)usage\s+limit\s+(exceeded|reached)", RateLimitKind::QuotaExceeded),
    (r"(?i)overloaded", RateLimitKind::Overloaded),
    (r"(?i)service\s+(unavailable|busy)", RateLimitKind::Overloaded),
    (r"(?i)capacity\s+(exceeded|limit)", RateLimitKind::Overloaded),
];

static PATTERNS: OnceLock<Vec<(Regex, RateLimitKind)>> = OnceLock::new();

fn patterns() -> &'static [(Regex, RateLimitKind)] {
    PATTERNS.get_or_init(|| {
        PATTERN_SPECS
            .iter()
            .filter_map(|(source, kind)| match Regex::new(source) {
                Ok(regex) => Some((regex, *kind)),
                Err(e) => {
                    log::error!("[RateLimitDetector] Invalid pattern {}: {}", source, e);
                    None
                }
            })
            .collect()
    })
}

static RETRY_AFTER: OnceLock<Option<Regex>> = OnceLock::new();

// "retry-after: 30", "Retry after 30s", "Please retry in 12.5s"
fn retry_after_regex() -> Option<&'static Regex> {
    RETRY_AFTER
        .get_or_init(|| Regex::new(r"(?i)retry[_\-\s]?(?:after|in)[:\s]*(\d+(?:\.\d+)?)\s*(ms)?").ok())
        .as_ref()
}

/// Stateless detector; cheap to construct per runner
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitDetector;

impl RateLimitDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, output: &str) -> Option<RateLimitHit> {
        patterns().iter().find_map(|(regex, kind)| {
            regex.find(output).map(|m| RateLimitHit {
                kind: *kind,
                matched: m.as_str().to_string(),
                retry_after: self.retry_after(output),
            })
        })
    }

    pub fn is_rate_limited(&self, output: &str) -> bool {
        self.detect(output).is_some()
    }

    fn retry_after(&self, output: &str) -> Option<Duration> {
        let caps = retry_after_regex()?.captures(output)?;
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        if caps.get(2).is_some() {
            Some(Duration::from_millis(value as u64))
        } else {
            Some(Duration::from_secs_f64(value))
        }
    }
}
