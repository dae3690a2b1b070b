//! Attempt loop for a single agent: telemetry, classification, backoff.
//!
//! Each attempt is bracketed by `start_agent`/`end_agent` on the tracker. A
//! failed attempt is classified; fatal failures and the last permitted attempt
//! end the loop, transient failures sleep for the computed backoff first.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::metrics::AttemptResult;
use crate::error::{PipelineError, ToolError};
use crate::io::config::RetryConfig;
use crate::io::error_log::log_error;
use crate::io::metrics_store::MetricsTracker;

/// What an invoker is asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRequest<'a> {
    pub agent: &'a str,
    pub attempt_number: u32,
    /// Token recorded by an earlier attempt, if any.
    pub checkpoint: Option<&'a str>,
}

/// Successful agent run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRun {
    pub cost_usd: f64,
}

/// Failed agent run. Failed attempts may still have spent money or made progress.
#[derive(Debug)]
pub struct AttemptFailure {
    pub error: anyhow::Error,
    pub cost_usd: f64,
    pub checkpoint: Option<String>,
}

impl From<anyhow::Error> for AttemptFailure {
    fn from(error: anyhow::Error) -> Self {
        Self {
            error,
            cost_usd: 0.0,
            checkpoint: None,
        }
    }
}

/// Runs one attempt of an agent.
pub trait AgentInvoker {
    fn invoke(&self, request: &AttemptRequest<'_>) -> Result<AgentRun, AttemptFailure>;
}

/// Waits out a backoff delay.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        thread::sleep(delay);
    }
}

/// Summary of a successful retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Attempts made in this call.
    pub attempts: u32,
    /// Attempt number of the successful attempt.
    pub attempt_number: u32,
    pub run: AgentRun,
}

/// Run `agent` until it succeeds, fails fatally, or exhausts `config.max_attempts`.
///
/// Attempt numbers continue from any attempts already recorded for the agent,
/// and backoff grows with the attempt number rather than restarting per call.
/// The terminal error is a [`PipelineError::Tool`] carrying the classification.
#[instrument(skip_all, fields(agent = agent))]
pub fn run_with_retry<I: AgentInvoker, S: Sleeper>(
    tracker: &MetricsTracker,
    config: &RetryConfig,
    agent: &str,
    invoker: &I,
    sleeper: &S,
) -> Result<RetryOutcome> {
    if config.max_attempts == 0 {
        return Err(anyhow!("retry.max_attempts must be > 0"));
    }
    let policy = config.backoff_policy();
    let first_attempt = next_attempt_number(tracker, agent);

    for offset in 0..config.max_attempts {
        let attempt_number = first_attempt + offset;
        let checkpoint = current_checkpoint(tracker, agent);

        tracker.start_agent(agent, attempt_number)?;
        let started = Instant::now();
        let result = invoker.invoke(&AttemptRequest {
            agent,
            attempt_number,
            checkpoint: checkpoint.as_deref(),
        });
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let failure = match result {
            Ok(run) => {
                tracker.end_agent(
                    agent,
                    &AttemptResult {
                        attempt_number,
                        duration_ms,
                        cost_usd: run.cost_usd,
                        success: true,
                        is_final_attempt: true,
                        error: None,
                    },
                )?;
                info!(attempt_number, duration_ms, "agent succeeded");
                return Ok(RetryOutcome {
                    attempts: offset + 1,
                    attempt_number,
                    run,
                });
            }
            Err(failure) => failure,
        };

        let tool_error = ToolError::wrap(agent, failure.error);
        let is_final = !tool_error.retryable || offset + 1 == config.max_attempts;
        if let Some(token) = &failure.checkpoint {
            tracker.checkpoint(agent, token)?;
        }
        tracker.end_agent(
            agent,
            &AttemptResult {
                attempt_number,
                duration_ms,
                cost_usd: failure.cost_usd,
                success: false,
                is_final_attempt: is_final,
                error: Some(tool_error.message.clone()),
            },
        )?;
        log_error(
            tracker.output_dir(),
            &format!("{agent} attempt {attempt_number}"),
            &tool_error.message,
        );

        if is_final {
            warn!(
                attempt_number,
                retryable = tool_error.retryable,
                category = ?tool_error.category,
                "agent failed"
            );
            return Err(PipelineError::Tool(tool_error).into());
        }

        let delay = policy.backoff_delay(&tool_error.message, attempt_number);
        info!(
            attempt_number,
            category = ?tool_error.category,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying after backoff"
        );
        sleeper.sleep(delay);
    }

    Err(anyhow!("agent {agent} exhausted its attempts"))
}

fn next_attempt_number(tracker: &MetricsTracker, agent: &str) -> u32 {
    tracker
        .load()
        .and_then(|doc| doc.metrics.agents.get(agent).cloned())
        .and_then(|metrics| metrics.attempts.iter().map(|a| a.attempt_number).max())
        .map_or(1, |last| last + 1)
}

fn current_checkpoint(tracker: &MetricsTracker, agent: &str) -> Option<String> {
    tracker
        .load()
        .and_then(|doc| doc.metrics.agents.get(agent).cloned())
        .and_then(|metrics| metrics.checkpoint)
}
