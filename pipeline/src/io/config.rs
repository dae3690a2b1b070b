//! Pipeline configuration stored under `.pipeline/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::{BackoffPolicy, RATE_LIMIT_FLOOR};

/// Pipeline configuration (TOML).
///
/// Missing fields default to the values below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub retry: RetryConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per agent before it is marked failed.
    pub max_attempts: u32,
    /// Backoff base for rate-limited failures; at least 30 000 ms.
    pub rate_limit_base_ms: u64,
    /// Backoff base for other transient failures.
    pub transient_base_ms: u64,
    /// Extra random delay as a fraction of the computed backoff, in `[0, 1)`.
    pub jitter_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll interval for `pipeline-monitor --follow`.
    pub poll_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base_ms: 30_000,
            transient_base_ms: 2_000,
            jitter_ratio: 0.1,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be > 0"));
        }
        if u128::from(self.retry.rate_limit_base_ms) < RATE_LIMIT_FLOOR.as_millis() {
            return Err(anyhow!(
                "retry.rate_limit_base_ms must be >= {}",
                RATE_LIMIT_FLOOR.as_millis()
            ));
        }
        if !(0.0..1.0).contains(&self.retry.jitter_ratio) {
            return Err(anyhow!("retry.jitter_ratio must be in [0, 1)"));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(anyhow!("monitor.poll_interval_ms must be > 0"));
        }
        Ok(())
    }
}

impl RetryConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            rate_limit_base: Duration::from_millis(self.rate_limit_base_ms),
            transient_base: Duration::from_millis(self.transient_base_ms),
            jitter_ratio: self.jitter_ratio,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write config to disk as TOML.
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
