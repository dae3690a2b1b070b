//! Table-driven classification of agent/tool failures.
//!
//! Rules are matched in order against the failure message; the first match
//! wins. Anything unmatched is fatal: unknown failure modes are not retried.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

/// Failure category assigned by the first matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Validation,
    RateLimit,
    Network,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub retryable: bool,
}

/// Backoff knobs. `jitter_ratio` must stay below 1.0 for delays to be strictly
/// increasing in the attempt number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub rate_limit_base: Duration,
    pub transient_base: Duration,
    pub jitter_ratio: f64,
}

/// Minimum delay before retrying a rate-limited call.
pub const RATE_LIMIT_FLOOR: Duration = Duration::from_secs(30);

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            rate_limit_base: RATE_LIMIT_FLOOR,
            transient_base: Duration::from_secs(2),
            jitter_ratio: 0.1,
        }
    }
}

struct Rule {
    category: ErrorCategory,
    pattern: &'static str,
    retryable: bool,
    base_delay: fn(&BackoffPolicy) -> Duration,
}

fn no_delay(_: &BackoffPolicy) -> Duration {
    Duration::ZERO
}

fn rate_limit_base(policy: &BackoffPolicy) -> Duration {
    policy.rate_limit_base.max(RATE_LIMIT_FLOOR)
}

fn transient_base(policy: &BackoffPolicy) -> Duration {
    policy.transient_base
}

// Order matters: credential and input problems win over transient wording.
const RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::Authentication,
        pattern: r"(?i)authenticat|unauthori[sz]ed|forbidden|invalid api key|permission denied|\b40[13]\b",
        retryable: false,
        base_delay: no_delay,
    },
    Rule {
        category: ErrorCategory::Validation,
        pattern: r"(?i)validation|invalid (argument|parameter|input|request)|schema violation",
        retryable: false,
        base_delay: no_delay,
    },
    Rule {
        category: ErrorCategory::RateLimit,
        pattern: r"(?i)rate[ _-]?limit|too many requests|quota exceeded|\b429\b",
        retryable: true,
        base_delay: rate_limit_base,
    },
    Rule {
        category: ErrorCategory::Network,
        pattern: r"(?i)time[ d]*out|econnreset|econnrefused|econnaborted|enotfound|eai_again|connection (reset|refused|closed|aborted)|socket hang up|\bdns\b|network|service unavailable|\b50[234]\b",
        retryable: true,
        base_delay: transient_base,
    },
];

static COMPILED: LazyLock<Vec<(Regex, &'static Rule)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|rule| (Regex::new(rule.pattern).unwrap(), rule))
        .collect()
});

fn matching_rule(message: &str) -> Option<&'static Rule> {
    COMPILED
        .iter()
        .find(|(regex, _)| regex.is_match(message))
        .map(|(_, rule)| *rule)
}

/// Classify a failure message.
pub fn classify(message: &str) -> Classification {
    match matching_rule(message) {
        Some(rule) => Classification {
            category: rule.category,
            retryable: rule.retryable,
        },
        None => Classification {
            category: ErrorCategory::Unknown,
            retryable: false,
        },
    }
}

/// True for transient failures (network, rate limiting).
pub fn is_retryable(message: &str) -> bool {
    classify(message).retryable
}

/// Backoff for `message` at `attempt` using the default policy and random jitter.
pub fn backoff_delay(message: &str, attempt: u32) -> Duration {
    BackoffPolicy::default().backoff_delay(message, attempt)
}

impl BackoffPolicy {
    /// Backoff for `message` at `attempt` (1-based) with random jitter.
    pub fn backoff_delay(&self, message: &str, attempt: u32) -> Duration {
        let unit: f64 = rand::random();
        self.delay_with_jitter(message, attempt, unit)
    }

    /// Deterministic backoff: `base * 2^(attempt-1)` plus `jitter_unit * jitter_ratio`
    /// of that value. `jitter_unit` is clamped to `[0, 1)`.
    ///
    /// Fatal and unknown failures get no delay.
    pub fn delay_with_jitter(&self, message: &str, attempt: u32, jitter_unit: f64) -> Duration {
        let Some(rule) = matching_rule(message) else {
            return Duration::ZERO;
        };
        if !rule.retryable {
            return Duration::ZERO;
        }
        let base_ms = u64::try_from((rule.base_delay)(self).as_millis()).unwrap_or(u64::MAX);
        let exponent = attempt.max(1) - 1;
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let scaled = base_ms.saturating_mul(factor);
        let ratio = self.jitter_ratio.clamp(0.0, 0.99);
        let unit = jitter_unit.clamp(0.0, 0.999_999);
        let jitter = (scaled as f64 * ratio * unit) as u64;
        Duration::from_millis(scaled.saturating_add(jitter))
    }
}
