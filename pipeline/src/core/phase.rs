//! Phase naming: agent → phase mapping and phase artifact paths.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Subdirectory of a work directory that holds phase artifacts.
pub const DELIVERABLES_DIR: &str = "deliverables";

pub const PRE_RECON: &str = "pre-recon";
pub const RECON: &str = "recon";
pub const VULNERABILITY_ANALYSIS: &str = "vulnerability-analysis";
pub const EXPLOITATION: &str = "exploitation";
pub const REPORTING: &str = "reporting";

/// Phase that owns `agent`.
///
/// - `*-vuln` agents belong to vulnerability analysis, `*-exploit` to exploitation.
/// - `report` belongs to reporting.
/// - Unrecognized agents form a phase named after themselves.
pub fn phase_for_agent(agent: &str) -> &str {
    match agent {
        PRE_RECON => PRE_RECON,
        RECON => RECON,
        "report" => REPORTING,
        _ if agent.ends_with("-vuln") => VULNERABILITY_ANALYSIS,
        _ if agent.ends_with("-exploit") => EXPLOITATION,
        _ => agent,
    }
}

/// Validate that a phase/category identifier is safe to embed in file names.
pub fn validate_phase_name(phase: &str) -> Result<()> {
    if phase.is_empty() {
        return Err(anyhow!("phase name must not be empty"));
    }
    if phase
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
    {
        return Err(anyhow!("phase name must be [A-Za-z0-9_-] only (got '{phase}')"));
    }
    Ok(())
}

/// Deterministic locations of a phase's deliverable + queue pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub deliverable: PathBuf,
    pub queue: PathBuf,
}

impl ArtifactPaths {
    pub fn new(work_dir: &Path, phase: &str) -> Self {
        let dir = work_dir.join(DELIVERABLES_DIR);
        Self {
            deliverable: dir.join(format!("{phase}_analysis_deliverable.md")),
            queue: dir.join(format!("{phase}_exploitation_queue.json")),
            dir,
        }
    }
}
