//! Run metrics document model and attempt bookkeeping.
//!
//! All mutations go through [`RunMetrics`] methods which finish by calling
//! [`RunMetrics::recompute`], so totals and phase percentages always agree
//! with the attempt history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::phase::phase_for_agent;
use crate::core::types::{AgentStatus, SessionStatus};

/// Current metrics document schema version.
pub const METRICS_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    METRICS_SCHEMA_VERSION
}

/// Persisted per-run metrics document (`<output_dir>/session.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetricsDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub session: MetricsSession,
    pub metrics: RunMetrics,
}

impl RunMetricsDocument {
    pub fn new(session: MetricsSession) -> Self {
        Self {
            schema_version: METRICS_SCHEMA_VERSION,
            session,
            metrics: RunMetrics::default(),
        }
    }
}

/// Session header embedded in the metrics document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSession {
    pub id: String,
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    pub total_duration_ms: u64,
    pub total_cost_usd: f64,
    pub phases: BTreeMap<String, PhaseMetrics>,
    pub agents: BTreeMap<String, AgentMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PhaseMetrics {
    pub duration_ms: u64,
    pub duration_percentage: f64,
    pub cost_usd: f64,
    pub agent_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMetrics {
    pub status: AgentStatus,
    /// Completed attempts, append-only.
    pub attempts: Vec<Attempt>,
    /// Duration of the successful attempt; 0 until one succeeds.
    pub final_duration_ms: u64,
    pub total_cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    /// Present only while an attempt is executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_attempt: Option<CurrentAttempt>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            status: AgentStatus::InProgress,
            attempts: Vec::new(),
            final_duration_ms: 0,
            total_cost_usd: 0.0,
            checkpoint: None,
            current_attempt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentAttempt {
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
}

/// One completed attempt. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub attempt_number: u32,
    pub duration_ms: u64,
    pub cost_usd: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of an attempt as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    pub attempt_number: u32,
    pub duration_ms: u64,
    pub cost_usd: f64,
    pub success: bool,
    pub is_final_attempt: bool,
    pub error: Option<String>,
}

impl RunMetrics {
    /// Mark `attempt_number` of `agent` as in flight, creating the agent if
    /// needed. An agent with an attempt in flight is always in-progress.
    pub fn record_start(&mut self, agent: &str, attempt_number: u32, now: DateTime<Utc>) {
        let entry = self.agents.entry(agent.to_string()).or_default();
        entry.status = AgentStatus::InProgress;
        entry.current_attempt = Some(CurrentAttempt {
            attempt_number,
            started_at: now,
        });
        self.recompute();
    }

    /// Append the finished attempt and settle the agent's status.
    pub fn record_end(&mut self, agent: &str, result: &AttemptResult, now: DateTime<Utc>) {
        let entry = self.agents.entry(agent.to_string()).or_default();
        entry.attempts.push(Attempt {
            attempt_number: result.attempt_number,
            duration_ms: result.duration_ms,
            cost_usd: result.cost_usd,
            success: result.success,
            timestamp: now,
            error: result.error.clone(),
        });
        entry.current_attempt = None;
        if result.success {
            entry.status = AgentStatus::Success;
            entry.final_duration_ms = result.duration_ms;
        } else if result.is_final_attempt {
            entry.status = AgentStatus::Failed;
        } else {
            entry.status = AgentStatus::InProgress;
        }
        self.recompute();
    }

    /// Store an opaque resumption token for `agent`.
    pub fn record_checkpoint(&mut self, agent: &str, token: &str) {
        let entry = self.agents.entry(agent.to_string()).or_default();
        entry.checkpoint = Some(token.to_string());
        self.recompute();
    }

    /// Re-derive agent costs, phase aggregates, and run totals from attempts.
    ///
    /// Every attempt's duration counts toward the run total, failed ones included.
    pub fn recompute(&mut self) {
        let mut phases: BTreeMap<String, PhaseMetrics> = BTreeMap::new();
        let mut total_duration_ms = 0u64;
        let mut total_cost_usd = 0.0;

        for (name, agent) in &mut self.agents {
            agent.total_cost_usd = agent.attempts.iter().map(|a| a.cost_usd).sum();
            let duration_ms: u64 = agent.attempts.iter().map(|a| a.duration_ms).sum();

            let phase = phases.entry(phase_for_agent(name).to_string()).or_default();
            phase.duration_ms += duration_ms;
            phase.cost_usd += agent.total_cost_usd;
            phase.agent_count += 1;

            total_duration_ms += duration_ms;
            total_cost_usd += agent.total_cost_usd;
        }

        for phase in phases.values_mut() {
            phase.duration_percentage = if total_duration_ms == 0 {
                0.0
            } else {
                phase.duration_ms as f64 / total_duration_ms as f64 * 100.0
            };
        }

        self.phases = phases;
        self.total_duration_ms = total_duration_ms;
        self.total_cost_usd = total_cost_usd;
    }
}
