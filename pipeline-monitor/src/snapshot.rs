//! Point-in-time view of one run, assembled from the registry and metrics documents.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing::debug;

use pipeline::core::metrics::RunMetrics;
use pipeline::io::metrics_store::read_metrics;
use pipeline::io::paths::{METRICS_FILE_NAME, PipelinePaths};
use pipeline::io::session_store::{Session, SessionStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub session: Session,
    pub output_dir: PathBuf,
    /// `None` until the metrics document exists and parses.
    pub metrics: Option<RunMetrics>,
}

/// Load a snapshot of `session_id`, or of the most recently started run.
///
/// Returns `Ok(None)` when no run is registered; an unknown id is an error.
pub fn load_snapshot(root: &Path, session_id: Option<&str>) -> Result<Option<Snapshot>> {
    let store = SessionStore::new(root);
    let session = match session_id {
        Some(id) => Some(
            store
                .find(id)
                .ok_or_else(|| anyhow!("unknown session '{id}'"))?,
        ),
        None => store.latest(),
    };
    let Some(session) = session else {
        return Ok(None);
    };

    let output_dir = PipelinePaths::new(root).output_dir(&session.id, session.output_path.as_deref());
    let metrics_path = output_dir.join(METRICS_FILE_NAME);
    // A half-written or missing document is "not available yet", not a failure.
    let metrics = match read_metrics(&metrics_path) {
        Ok(doc) => doc.map(|doc| doc.metrics),
        Err(err) => {
            debug!(path = %metrics_path.display(), err = %err, "metrics not readable yet");
            None
        }
    };

    Ok(Some(Snapshot {
        session,
        output_dir,
        metrics,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::session::{start_session, tracker_for};
    use std::fs;

    #[test]
    fn empty_registry_has_no_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_snapshot(temp.path(), None).expect("load").is_none());
    }

    #[test]
    fn unknown_session_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_snapshot(temp.path(), Some("missing")).expect_err("unknown");
        assert!(err.to_string().contains("unknown session"));
    }

    #[test]
    fn defaults_to_latest_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        start_session(temp.path(), "https://a.example", "/repos/a", None).expect("start a");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = start_session(temp.path(), "https://b.example", "/repos/b", None).expect("start b");

        let snapshot = load_snapshot(temp.path(), None)
            .expect("load")
            .expect("snapshot");
        assert_eq!(snapshot.session.id, b.session.id);
        assert_eq!(snapshot.metrics, Some(RunMetrics::default()));
    }

    #[test]
    fn corrupt_metrics_are_not_available() {
        let temp = tempfile::tempdir().expect("tempdir");
        let started =
            start_session(temp.path(), "https://a.example", "/repos/a", None).expect("start");
        let tracker = tracker_for(temp.path(), &started.session);
        fs::write(tracker.path(), "{\"metrics\":").expect("truncate");

        let snapshot = load_snapshot(temp.path(), Some(&started.session.id))
            .expect("load")
            .expect("snapshot");
        assert!(snapshot.metrics.is_none());
    }
}
