//! `.pipeline/` scaffolding for a base directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::io::config::{PipelineConfig, write_config};
use crate::io::paths::PipelinePaths;

/// Options for `init_pipeline`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overwrite an existing `config.toml` with defaults.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct InitOutcome {
    pub paths: PipelinePaths,
    /// False when an existing config was left in place.
    pub config_written: bool,
}

/// Create `.pipeline/` and `.pipeline/runs/`, and write the default config.
///
/// The registry and existing runs are never touched; an existing config is
/// only replaced with `force`.
pub fn init_pipeline(root: &Path, options: &InitOptions) -> Result<InitOutcome> {
    let paths = PipelinePaths::new(root);
    if paths.pipeline_dir.exists() && !paths.pipeline_dir.is_dir() {
        return Err(anyhow!(
            "pipeline init: {} exists but is not a directory",
            paths.pipeline_dir.display()
        ));
    }
    fs::create_dir_all(&paths.runs_dir)
        .with_context(|| format!("create directory {}", paths.runs_dir.display()))?;

    let config_written = options.force || !paths.config_path.exists();
    if config_written {
        write_config(&paths.config_path, &PipelineConfig::default())?;
    }
    info!(
        root = %paths.root.display(),
        config_written,
        "pipeline initialized"
    );
    Ok(InitOutcome {
        paths,
        config_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_creates_layout_and_default_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = init_pipeline(temp.path(), &InitOptions::default()).expect("init");

        assert!(outcome.config_written);
        assert!(outcome.paths.runs_dir.is_dir());
        let cfg = load_config(&outcome.paths.config_path).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn existing_config_is_kept_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = PipelinePaths::new(temp.path());
        let mut custom = PipelineConfig::default();
        custom.retry.max_attempts = 7;
        write_config(&paths.config_path, &custom).expect("write");

        let kept = init_pipeline(temp.path(), &InitOptions::default()).expect("init");
        assert!(!kept.config_written);
        assert_eq!(load_config(&paths.config_path).expect("load").retry.max_attempts, 7);

        let forced = init_pipeline(temp.path(), &InitOptions { force: true }).expect("force");
        assert!(forced.config_written);
        assert_eq!(load_config(&paths.config_path).expect("load").retry.max_attempts, 3);
    }

    #[test]
    fn pipeline_path_that_is_a_file_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join(".pipeline"), "not a dir").expect("write");
        let err = init_pipeline(temp.path(), &InitOptions::default()).expect_err("file");
        assert!(err.to_string().contains("not a directory"));
    }
}
