//! Orchestration for starting and finishing a session.
//!
//! Starting registers the session (enforcing one in-progress run per
//! repository) and initializes its metrics document. Finishing records the
//! terminal status in both the registry and the metrics document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::core::types::SessionStatus;
use crate::error::PipelineError;
use crate::io::metrics_store::MetricsTracker;
use crate::io::paths::PipelinePaths;
use crate::io::session_store::{Session, SessionStore};

/// Outcome of `pipeline start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub session: Session,
    pub output_dir: PathBuf,
}

/// Register a new session for `repo_path` and initialize its metrics.
pub fn start_session(
    root: &Path,
    web_url: &str,
    repo_path: &str,
    output_path: Option<&Path>,
) -> Result<StartOutcome> {
    let paths = PipelinePaths::new(root);
    let store = SessionStore::at(paths.sessions_path.clone());
    let session = store.create(web_url, repo_path, output_path)?;

    let output_dir = paths.output_dir(&session.id, session.output_path.as_deref());
    MetricsTracker::new(&session, &output_dir)
        .initialize()
        .with_context(|| format!("initialize metrics for session {}", session.id))?;

    info!(session_id = %session.id, output_dir = %output_dir.display(), "session started");
    Ok(StartOutcome {
        session,
        output_dir,
    })
}

/// Tracker for an existing session, resolving its output directory.
pub fn tracker_for(root: &Path, session: &Session) -> MetricsTracker {
    let paths = PipelinePaths::new(root);
    let output_dir = paths.output_dir(&session.id, session.output_path.as_deref());
    MetricsTracker::new(session, &output_dir)
}

/// Move `id` to a terminal status in the registry and its metrics document.
pub fn finish_session(root: &Path, id: &str, status: SessionStatus) -> Result<Session> {
    if !status.is_terminal() {
        return Err(anyhow!("finish requires a terminal status (got {status})"));
    }
    let store = SessionStore::new(root);
    let mut session = store
        .find(id)
        .ok_or_else(|| anyhow!("unknown session '{id}'"))?;
    if session.status.is_terminal() {
        return Err(PipelineError::Validation {
            message: format!("session {id} already finished as {}", session.status),
            conflicting_session: None,
        }
        .into());
    }

    store.update_status(id, status)?;
    session.status = status;
    tracker_for(root, &session).mark_session(status)?;

    info!(session_id = id, status = %status, "session finished");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_creates_session_and_metrics() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome =
            start_session(temp.path(), "https://example.com", "/repos/app", None).expect("start");

        assert_eq!(
            outcome.output_dir,
            temp.path()
                .join(".pipeline/runs")
                .join(&outcome.session.id)
        );
        let doc = tracker_for(temp.path(), &outcome.session)
            .load()
            .expect("metrics initialized");
        assert_eq!(doc.session.id, outcome.session.id);
        assert_eq!(doc.session.repo_path.as_deref(), Some("/repos/app"));
    }

    #[test]
    fn start_honors_explicit_output_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = start_session(
            temp.path(),
            "https://example.com",
            "/repos/app",
            Some(Path::new("audit")),
        )
        .expect("start");
        assert_eq!(outcome.output_dir, temp.path().join("audit"));
        assert!(temp.path().join("audit/session.json").is_file());
    }

    #[test]
    fn finish_releases_repository_for_new_runs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first =
            start_session(temp.path(), "https://example.com", "/repos/app", None).expect("start");

        let err = start_session(temp.path(), "https://example.com", "/repos/app", None)
            .expect_err("duplicate");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Validation { .. })
        ));

        let finished =
            finish_session(temp.path(), &first.session.id, SessionStatus::Completed)
                .expect("finish");
        assert_eq!(finished.status, SessionStatus::Completed);
        let doc = tracker_for(temp.path(), &finished).load().expect("metrics");
        assert_eq!(doc.session.status, SessionStatus::Completed);
        assert!(doc.session.completed_at.is_some());

        start_session(temp.path(), "https://example.com", "/repos/app", None)
            .expect("start after finish");
    }

    #[test]
    fn finished_session_cannot_be_finished_again() {
        let temp = tempfile::tempdir().expect("tempdir");
        let started =
            start_session(temp.path(), "https://example.com", "/repos/app", None).expect("start");
        finish_session(temp.path(), &started.session.id, SessionStatus::Completed)
            .expect("finish");
        let completed_at = tracker_for(temp.path(), &started.session)
            .load()
            .and_then(|doc| doc.session.completed_at)
            .expect("completedAt stamped");

        let err = finish_session(temp.path(), &started.session.id, SessionStatus::Failed)
            .expect_err("second finish");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Validation { .. })
        ));

        let session = SessionStore::new(temp.path())
            .find(&started.session.id)
            .expect("registered");
        assert_eq!(session.status, SessionStatus::Completed);
        let doc = tracker_for(temp.path(), &session).load().expect("metrics");
        assert_eq!(doc.session.status, SessionStatus::Completed);
        assert_eq!(doc.session.completed_at, Some(completed_at));
    }

    #[test]
    fn finish_rejects_in_progress_and_unknown_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = finish_session(temp.path(), "nope", SessionStatus::Failed).expect_err("unknown");
        assert!(err.to_string().contains("unknown session"));
        let err =
            finish_session(temp.path(), "nope", SessionStatus::InProgress).expect_err("status");
        assert!(err.to_string().contains("terminal status"));
    }
}
