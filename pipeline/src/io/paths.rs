//! Well-known locations under a pipeline base directory.

use std::path::{Path, PathBuf};

/// Name of the metrics document inside a run's output directory.
pub const METRICS_FILE_NAME: &str = "session.json";
/// Name of the append-only error log inside a run's output directory.
pub const ERROR_LOG_FILE_NAME: &str = "error.log";

/// Paths derived from an explicit base directory (normally the operator's cwd).
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub root: PathBuf,
    pub pipeline_dir: PathBuf,
    pub sessions_path: PathBuf,
    pub config_path: PathBuf,
    pub runs_dir: PathBuf,
}

impl PipelinePaths {
    pub fn new(root: &Path) -> Self {
        let pipeline_dir = root.join(".pipeline");
        Self {
            root: root.to_path_buf(),
            sessions_path: pipeline_dir.join("sessions.json"),
            config_path: pipeline_dir.join("config.toml"),
            runs_dir: pipeline_dir.join("runs"),
            pipeline_dir,
        }
    }

    /// Output directory used when a session does not name one.
    pub fn default_output_dir(&self, session_id: &str) -> PathBuf {
        self.runs_dir.join(session_id)
    }

    /// Resolve a session's output directory, relative paths against `root`.
    pub fn output_dir(&self, session_id: &str, output_path: Option<&Path>) -> PathBuf {
        match output_path {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.root.join(path),
            None => self.default_output_dir(session_id),
        }
    }
}
