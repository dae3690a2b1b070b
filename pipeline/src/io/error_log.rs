//! Best-effort error log at `<output_dir>/error.log`.

use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::io::paths::ERROR_LOG_FILE_NAME;

/// Append `[timestamp] context: error` to the run's error log.
///
/// Never fails; problems writing the log are reported through tracing only.
pub fn log_error(output_dir: &Path, context: &str, error: &dyn Display) {
    let line = format!(
        "[{}] {context}: {error}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    if let Err(err) = append(output_dir, &line) {
        debug!(err = %format!("{err:#}"), "error log write failed");
    }
}

fn append(output_dir: &Path, line: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create directory {}", output_dir.display()))?;
    let path = output_dir.join(ERROR_LOG_FILE_NAME);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_timestamped_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = temp.path().join("run");

        log_error(&out, "recon attempt 1", &"connection reset");
        log_error(&out, "recon attempt 2", &"rate limit exceeded");

        let contents = fs::read_to_string(out.join(ERROR_LOG_FILE_NAME)).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("recon attempt 1: connection reset"));
        assert!(lines[1].contains("rate limit exceeded"));
    }

    #[test]
    fn unwritable_directory_is_swallowed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").expect("write");

        log_error(&blocker.join("run"), "ctx", &"boom");
        assert!(!blocker.join("run").exists());
    }
}
