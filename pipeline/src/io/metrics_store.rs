//! Attempt metrics tracker persisted at `<output_dir>/session.json`.
//!
//! Every mutation reloads the document, applies the change, and writes it back
//! immediately so a monitor polling the file sees progress as it happens.
//! An unreadable document is treated as empty; a failed write is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::metrics::{
    AttemptResult, METRICS_SCHEMA_VERSION, MetricsSession, RunMetrics, RunMetricsDocument,
};
use crate::core::types::SessionStatus;
use crate::error::PipelineError;
use crate::io::atomic::write_json_atomic;
use crate::io::paths::METRICS_FILE_NAME;
use crate::io::session_store::Session;

/// Read a metrics document, distinguishing "missing" from "corrupt".
///
/// Returns `Ok(None)` when the file does not exist and `Err` when it exists but
/// cannot be read, parsed, or carries another schema version.
pub fn read_metrics(path: &Path) -> Result<Option<RunMetricsDocument>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(anyhow!("read {}: {err}", path.display())),
    };
    let doc: RunMetricsDocument = serde_json::from_str(&contents)
        .map_err(|err| anyhow!("parse {}: {err}", path.display()))?;
    if doc.schema_version != METRICS_SCHEMA_VERSION {
        return Err(anyhow!(
            "{} has schema_version {} (expected {METRICS_SCHEMA_VERSION})",
            path.display(),
            doc.schema_version
        ));
    }
    Ok(Some(doc))
}

/// Tracker bound to one session's output directory.
#[derive(Debug, Clone)]
pub struct MetricsTracker {
    session: MetricsSession,
    output_dir: PathBuf,
    path: PathBuf,
}

impl MetricsTracker {
    pub fn new(session: &Session, output_dir: &Path) -> Self {
        Self {
            session: MetricsSession {
                id: session.id.clone(),
                web_url: session.web_url.clone(),
                repo_path: Some(session.repo_path.clone()),
                status: session.status,
                created_at: session.started_at,
                completed_at: None,
            },
            output_dir: output_dir.to_path_buf(),
            path: output_dir.join(METRICS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Load the document; missing or corrupt content yields `None`.
    pub fn load(&self) -> Option<RunMetricsDocument> {
        match read_metrics(&self.path) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(path = %self.path.display(), err = %err, "unreadable metrics document, treating as empty");
                None
            }
        }
    }

    /// Ensure the metrics document exists, creating an empty one if needed.
    pub fn initialize(&self) -> Result<RunMetricsDocument> {
        if let Some(doc) = self.load() {
            debug!(path = %self.path.display(), "metrics document already initialized");
            return Ok(doc);
        }
        let doc = RunMetricsDocument::new(self.session.clone());
        self.save(&doc)?;
        info!(session_id = %self.session.id, path = %self.path.display(), "metrics document initialized");
        Ok(doc)
    }

    /// Record that `attempt_number` of `agent` has started.
    pub fn start_agent(&self, agent: &str, attempt_number: u32) -> Result<()> {
        debug!(agent, attempt_number, "agent attempt started");
        self.update(|metrics| metrics.record_start(agent, attempt_number, Utc::now()))
    }

    /// Record the end of an attempt and settle the agent's status.
    pub fn end_agent(&self, agent: &str, result: &AttemptResult) -> Result<()> {
        debug!(
            agent,
            attempt_number = result.attempt_number,
            success = result.success,
            is_final = result.is_final_attempt,
            duration_ms = result.duration_ms,
            cost_usd = result.cost_usd,
            "agent attempt ended"
        );
        self.update(|metrics| metrics.record_end(agent, result, Utc::now()))
    }

    /// Store an opaque resumption token for `agent`.
    pub fn checkpoint(&self, agent: &str, token: &str) -> Result<()> {
        debug!(agent, "agent checkpoint recorded");
        self.update(|metrics| metrics.record_checkpoint(agent, token))
    }

    /// Set the session status in the metrics document; terminal statuses stamp `completedAt`.
    pub fn mark_session(&self, status: SessionStatus) -> Result<()> {
        let mut doc = self.load_or_empty();
        doc.session.status = status;
        doc.session.completed_at = status.is_terminal().then(Utc::now);
        self.save(&doc)?;
        info!(session_id = %doc.session.id, status = %status, "metrics session status updated");
        Ok(())
    }

    fn update<F: FnOnce(&mut RunMetrics)>(&self, apply: F) -> Result<()> {
        let mut doc = self.load_or_empty();
        apply(&mut doc.metrics);
        self.save(&doc)
    }

    fn load_or_empty(&self) -> RunMetricsDocument {
        self.load()
            .unwrap_or_else(|| RunMetricsDocument::new(self.session.clone()))
    }

    fn save(&self, doc: &RunMetricsDocument) -> Result<()> {
        write_json_atomic(&self.path, doc).map_err(|err| {
            PipelineError::Corruption {
                path: self.path.clone(),
                message: format!("{err:#}"),
            }
            .into()
        })
    }
}
