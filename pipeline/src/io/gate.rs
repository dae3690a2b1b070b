//! Phase gate: verify a phase produced its deliverable + queue pair.
//!
//! The queue is consumed programmatically by the next phase while the
//! deliverable is for human review. A phase that wrote only one of them, or a
//! malformed queue, must not advance the pipeline.

use std::fs;
use std::path::Path;

use jsonschema::validator_for;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::phase::{ArtifactPaths, validate_phase_name};

const QUEUE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/queue/v1.schema.json"
));

/// Field holding the queue entries.
pub const QUEUE_FIELD: &str = "vulnerabilities";

/// Why a phase hand-off was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("invalid phase name: {0}")]
    InvalidPhase(String),
    #[error(
        "Neither deliverable nor queue file exists for phase '{phase}'; the analysis must write both"
    )]
    NothingProduced { phase: String },
    #[error("Deliverable exists but queue file missing for phase '{phase}'")]
    QueueMissing { phase: String },
    #[error("Queue exists but deliverable file missing for phase '{phase}'")]
    DeliverableMissing { phase: String },
    #[error("Invalid JSON structure in queue for phase '{phase}': {detail}")]
    InvalidJson { phase: String, detail: String },
    #[error("Missing or invalid 'vulnerabilities' array in queue for phase '{phase}'")]
    MissingEntries { phase: String },
    #[error("read queue {path}: {detail}")]
    Read { path: String, detail: String },
    #[error("queue schema unusable: {0}")]
    Schema(String),
}

/// Gate result handed to the next phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub should_exploit: bool,
    pub vulnerability_count: usize,
}

/// Non-failing gate result for callers that branch on a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<GateDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Validate the artifact pair for `phase` under `work_dir/deliverables/`.
pub fn validate_phase(phase: &str, work_dir: &Path) -> Result<GateDecision, GateError> {
    validate_phase_name(phase).map_err(|err| GateError::InvalidPhase(err.to_string()))?;
    let paths = ArtifactPaths::new(work_dir, phase);
    let phase = phase.to_string();

    let has_deliverable = paths.deliverable.is_file();
    let has_queue = paths.queue.is_file();
    debug!(
        phase = %phase,
        deliverable = has_deliverable,
        queue = has_queue,
        dir = %paths.dir.display(),
        "checking phase artifacts"
    );

    match (has_deliverable, has_queue) {
        (false, false) => return Err(GateError::NothingProduced { phase }),
        (true, false) => return Err(GateError::QueueMissing { phase }),
        (false, true) => return Err(GateError::DeliverableMissing { phase }),
        (true, true) => {}
    }

    let contents = fs::read_to_string(&paths.queue).map_err(|err| GateError::Read {
        path: paths.queue.display().to_string(),
        detail: err.to_string(),
    })?;
    let queue: Value = serde_json::from_str(&contents).map_err(|err| GateError::InvalidJson {
        phase: phase.clone(),
        detail: err.to_string(),
    })?;

    check_queue_schema(&queue, &phase)?;
    let count = queue_entry_count(&queue).ok_or(GateError::MissingEntries {
        phase: phase.clone(),
    })?;

    info!(phase = %phase, vulnerability_count = count, "phase gate passed");
    Ok(GateDecision {
        should_exploit: count > 0,
        vulnerability_count: count,
    })
}

/// Like [`validate_phase`], but never fails.
pub fn validate_phase_safe(phase: &str, work_dir: &Path) -> GateReport {
    match validate_phase(phase, work_dir) {
        Ok(decision) => GateReport {
            success: true,
            data: Some(decision),
            error: None,
        },
        Err(err) => {
            warn!(phase, err = %err, "phase gate failed");
            GateReport {
                success: false,
                data: None,
                error: Some(err.to_string()),
            }
        }
    }
}

fn queue_entry_count(queue: &Value) -> Option<usize> {
    queue.get(QUEUE_FIELD).and_then(Value::as_array).map(Vec::len)
}

fn check_queue_schema(queue: &Value, phase: &str) -> Result<(), GateError> {
    let schema: Value =
        serde_json::from_str(QUEUE_SCHEMA).map_err(|err| GateError::Schema(err.to_string()))?;
    let validator = validator_for(&schema).map_err(|err| GateError::Schema(err.to_string()))?;
    if !validator.is_valid(queue) {
        let messages = validator
            .iter_errors(queue)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        debug!(phase, errors = ?messages, "queue schema violations");
        return Err(GateError::MissingEntries {
            phase: phase.to_string(),
        });
    }
    Ok(())
}
