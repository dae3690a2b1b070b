//! Session registry persisted at `.pipeline/sessions.json`.
//!
//! The registry is read-modify-written as a whole on every mutation. There is
//! no file lock: two processes creating a run for the same repository at the
//! same moment can both pass the duplicate check (last writer wins).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::types::SessionStatus;
use crate::error::PipelineError;
use crate::io::atomic::write_json_atomic;
use crate::io::paths::PipelinePaths;

/// One assessment run of one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub web_url: String,
    /// Uniqueness key for the single-active-run rule.
    pub repo_path: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

/// Persisted registry document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRegistry {
    pub sessions: Vec<Session>,
}

/// Handle to the registry file under an explicit base directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(root: &Path) -> Self {
        Self::at(PipelinePaths::new(root).sessions_path)
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the registry. Missing or unparseable content yields an empty registry.
    pub fn load(&self) -> SessionRegistry {
        debug!(path = %self.path.display(), "loading session registry");
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return SessionRegistry::default(),
            Err(err) => {
                warn!(path = %self.path.display(), err = %err, "unreadable session registry, treating as empty");
                return SessionRegistry::default();
            }
        };
        match serde_json::from_str::<SessionRegistry>(&contents) {
            Ok(registry) => {
                debug!(sessions = registry.sessions.len(), "session registry loaded");
                registry
            }
            Err(err) => {
                warn!(path = %self.path.display(), err = %err, "corrupt session registry, treating as empty");
                SessionRegistry::default()
            }
        }
    }

    pub fn list(&self) -> Vec<Session> {
        self.load().sessions
    }

    pub fn find(&self, id: &str) -> Option<Session> {
        self.load().sessions.into_iter().find(|s| s.id == id)
    }

    /// Most recently started session, if any.
    pub fn latest(&self) -> Option<Session> {
        self.load()
            .sessions
            .into_iter()
            .max_by(|a, b| a.started_at.cmp(&b.started_at))
    }

    /// Register a new in-progress session for `repo_path`.
    ///
    /// Fails with [`PipelineError::Validation`] if another session for the same
    /// repository is still in progress.
    pub fn create(
        &self,
        web_url: &str,
        repo_path: &str,
        output_path: Option<&Path>,
    ) -> Result<Session> {
        let mut registry = self.load();

        if let Some(active) = registry
            .sessions
            .iter()
            .find(|s| s.repo_path == repo_path && s.status == SessionStatus::InProgress)
        {
            return Err(PipelineError::Validation {
                message: format!(
                    "session {} is already in progress for {repo_path}",
                    active.id
                ),
                conflicting_session: Some(active.id.clone()),
            }
            .into());
        }

        let id = unique_session_id(&registry);
        let session = Session {
            id,
            web_url: web_url.to_string(),
            repo_path: repo_path.to_string(),
            status: SessionStatus::InProgress,
            started_at: Utc::now(),
            output_path: output_path.map(Path::to_path_buf),
        };
        registry.sessions.push(session.clone());
        self.save(&registry)?;

        info!(session_id = %session.id, repo_path, web_url, "session created");
        Ok(session)
    }

    /// Set the status of `id`. Unknown ids are ignored.
    ///
    /// A run leaves in-progress exactly once: changing a completed or failed
    /// run fails with [`PipelineError::Validation`].
    pub fn update_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        let mut registry = self.load();
        let Some(session) = registry.sessions.iter_mut().find(|s| s.id == id) else {
            debug!(session_id = id, "update_status for unknown session ignored");
            return Ok(());
        };
        if session.status.is_terminal() {
            return Err(PipelineError::Validation {
                message: format!(
                    "session {id} is already {} and cannot become {status}",
                    session.status
                ),
                conflicting_session: None,
            }
            .into());
        }
        if session.status == status {
            return Ok(());
        }
        session.status = status;
        self.save(&registry)?;
        info!(session_id = id, status = %status, "session status updated");
        Ok(())
    }

    fn save(&self, registry: &SessionRegistry) -> Result<()> {
        debug!(path = %self.path.display(), sessions = registry.sessions.len(), "writing session registry");
        write_json_atomic(&self.path, registry)
            .with_context(|| format!("write session registry {}", self.path.display()))
    }
}

fn unique_session_id(registry: &SessionRegistry) -> String {
    loop {
        let id = generate_session_id();
        if !registry.sessions.iter().any(|s| s.id == id) {
            return id;
        }
    }
}

fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(12)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());
        (temp, store)
    }

    #[test]
    fn load_missing_file_is_empty() {
        let (_temp, store) = store();
        assert_eq!(store.load(), SessionRegistry::default());
    }

    #[test]
    fn load_malformed_file_is_empty() {
        let (_temp, store) = store();
        fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
        fs::write(store.path(), "{ sessions: [ not json").expect("write");
        assert!(store.load().sessions.is_empty());
    }

    #[test]
    fn create_persists_in_progress_session() {
        let (_temp, store) = store();
        let session = store
            .create("https://example.com", "/repos/app", None)
            .expect("create");

        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.id.len(), 12);
        assert_eq!(store.list(), vec![session.clone()]);
        assert_eq!(store.find(&session.id), Some(session));
    }

    #[test]
    fn duplicate_in_progress_create_is_rejected() {
        let (_temp, store) = store();
        let first = store
            .create("https://example.com", "/repos/app", None)
            .expect("create");

        let err = store
            .create("https://example.com", "/repos/app", None)
            .expect_err("duplicate should fail");
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Validation {
                conflicting_session,
                ..
            }) => assert_eq!(conflicting_session.as_deref(), Some(first.id.as_str())),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn create_after_terminal_status_succeeds() {
        let (_temp, store) = store();
        for status in [SessionStatus::Completed, SessionStatus::Failed] {
            let session = store
                .create("https://example.com", "/repos/app", None)
                .expect("create");
            store.update_status(&session.id, status).expect("update");
        }
        store
            .create("https://example.com", "/repos/app", None)
            .expect("create after terminal");
        assert_eq!(store.list().len(), 3);
    }

    #[test]
    fn terminal_status_cannot_change() {
        let (_temp, store) = store();
        let first = store
            .create("https://example.com", "/repos/app", None)
            .expect("create");
        store
            .update_status(&first.id, SessionStatus::Completed)
            .expect("complete");
        let second = store
            .create("https://example.com", "/repos/app", None)
            .expect("create after completion");

        for status in [SessionStatus::InProgress, SessionStatus::Failed] {
            let err = store
                .update_status(&first.id, status)
                .expect_err("terminal run is frozen");
            assert!(matches!(
                err.downcast_ref::<PipelineError>(),
                Some(PipelineError::Validation { .. })
            ));
        }

        let in_progress: Vec<String> = store
            .list()
            .into_iter()
            .filter(|s| s.status == SessionStatus::InProgress)
            .map(|s| s.id)
            .collect();
        assert_eq!(in_progress, vec![second.id]);
        assert_eq!(
            store.find(&first.id).map(|s| s.status),
            Some(SessionStatus::Completed)
        );
    }

    #[test]
    fn different_repositories_are_independent() {
        let (_temp, store) = store();
        store
            .create("https://a.example.com", "/repos/a", None)
            .expect("create a");
        store
            .create("https://b.example.com", "/repos/b", Some(Path::new("out/b")))
            .expect("create b");
        let sessions = store.list();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].output_path, Some(PathBuf::from("out/b")));
    }

    #[test]
    fn update_status_for_unknown_id_is_noop() {
        let (_temp, store) = store();
        store.update_status("missing", SessionStatus::Failed).expect("noop");
        assert!(!store.path().exists());
    }

    #[test]
    fn registry_uses_camel_case_fields() {
        let (_temp, store) = store();
        store
            .create("https://example.com", "/repos/app", Some(Path::new("/out")))
            .expect("create");
        let raw = fs::read_to_string(store.path()).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        let session = &value["sessions"][0];
        assert_eq!(session["webUrl"], "https://example.com");
        assert_eq!(session["repoPath"], "/repos/app");
        assert_eq!(session["status"], "in-progress");
        assert_eq!(session["outputPath"], "/out");
        assert!(session["startedAt"].is_string());
    }
}
