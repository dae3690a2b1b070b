//! Terminal and JSON rendering of a [`Snapshot`].

use std::fmt::Write as _;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};

use pipeline::core::metrics::{AgentMetrics, RunMetrics};
use pipeline::core::types::{AgentStatus, SessionStatus};

use crate::snapshot::Snapshot;

pub const NOT_AVAILABLE: &str = "Metrics not available yet";
pub const NO_SESSIONS: &str = "No sessions registered";

/// Single-line JSON; `null` when there is nothing to show.
pub fn render_json(snapshot: Option<&Snapshot>) -> Result<String> {
    serde_json::to_string(&snapshot).context("serialize snapshot")
}

/// Multi-line human view. Always ends with a newline.
pub fn render_human(snapshot: Option<&Snapshot>) -> String {
    let Some(snapshot) = snapshot else {
        return format!("{}\n", NO_SESSIONS.yellow());
    };
    let session = &snapshot.session;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({})",
        "Session".bold(),
        session.id,
        session_status(session.status)
    );
    let _ = writeln!(out, "  target:  {}", session.web_url);
    let _ = writeln!(out, "  repo:    {}", session.repo_path);
    let _ = writeln!(
        out,
        "  started: {}",
        session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "  output:  {}", snapshot.output_dir.display());

    match &snapshot.metrics {
        Some(metrics) => render_metrics(&mut out, metrics),
        None => {
            let _ = writeln!(out, "\n{}", NOT_AVAILABLE.yellow());
        }
    }
    out
}

fn render_metrics(out: &mut String, metrics: &RunMetrics) {
    if metrics.agents.is_empty() {
        let _ = writeln!(out, "\n{}", "No agents have run yet".dimmed());
    } else {
        let _ = writeln!(out, "\n{}", "Agents".bold());
        for (name, agent) in &metrics.agents {
            let _ = writeln!(
                out,
                "  {name:<24} {} {}",
                agent_status(agent.status),
                agent_detail(agent)
            );
        }
    }

    if !metrics.phases.is_empty() {
        let _ = writeln!(out, "\n{}", "Phases".bold());
        for (name, phase) in &metrics.phases {
            let _ = writeln!(
                out,
                "  {name:<24} {:>9} {:>6.1}%  ${:.2}  agents: {}",
                format_duration(phase.duration_ms),
                phase.duration_percentage,
                phase.cost_usd,
                phase.agent_count
            );
        }
    }

    let _ = writeln!(
        out,
        "\n{} {}  ${:.2}",
        "Total".bold(),
        format_duration(metrics.total_duration_ms),
        metrics.total_cost_usd
    );
}

fn agent_detail(agent: &AgentMetrics) -> String {
    let mut detail = format!(
        "attempts: {}  ${:.2}",
        agent.attempts.len(),
        agent.total_cost_usd
    );
    if agent.status == AgentStatus::Success {
        let _ = write!(detail, "  took {}", format_duration(agent.final_duration_ms));
    }
    if let Some(current) = &agent.current_attempt {
        let _ = write!(
            detail,
            "  running attempt {} since {}",
            current.attempt_number,
            current.started_at.format("%H:%M:%S")
        );
    } else if agent.status == AgentStatus::Failed {
        if let Some(error) = agent.attempts.last().and_then(|a| a.error.as_deref()) {
            let _ = write!(detail, "  last error: {error}");
        }
    }
    detail
}

fn session_status(status: SessionStatus) -> ColoredString {
    match status {
        SessionStatus::Completed => status.as_str().green(),
        SessionStatus::Failed => status.as_str().red(),
        SessionStatus::InProgress => status.as_str().yellow(),
    }
}

fn agent_status(status: AgentStatus) -> ColoredString {
    let padded = format!("{:<11}", status.as_str());
    match status {
        AgentStatus::Success => padded.green(),
        AgentStatus::Failed => padded.red(),
        AgentStatus::InProgress => padded.yellow(),
    }
}

/// `850ms`, `12.3s`, `4m 05s`, `1h 02m`.
pub fn format_duration(ms: u64) -> String {
    match ms {
        0..1_000 => format!("{ms}ms"),
        1_000..60_000 => format!("{:.1}s", ms as f64 / 1_000.0),
        60_000..3_600_000 => format!("{}m {:02}s", ms / 60_000, (ms % 60_000) / 1_000),
        _ => format!("{}h {:02}m", ms / 3_600_000, (ms % 3_600_000) / 60_000),
    }
}
