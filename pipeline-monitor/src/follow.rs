//! Live-follow loop: re-render on every tick, print only when the view changes.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::render::{render_human, render_json};
use crate::snapshot::load_snapshot;

#[derive(Debug, Clone)]
pub struct FollowOptions {
    pub root: PathBuf,
    pub session_id: Option<String>,
    pub json: bool,
    pub interval: Duration,
}

/// Render one frame for the current on-disk state.
pub fn frame(options: &FollowOptions) -> Result<String> {
    let snapshot = load_snapshot(&options.root, options.session_id.as_deref())?;
    if options.json {
        let mut line = render_json(snapshot.as_ref())?;
        line.push('\n');
        Ok(line)
    } else {
        Ok(render_human(snapshot.as_ref()))
    }
}

/// [`frame`] on the blocking pool; the registry and metrics reads are `std::fs`.
async fn frame_blocking(options: &FollowOptions) -> Result<String> {
    let options = options.clone();
    tokio::task::spawn_blocking(move || frame(&options))
        .await
        .context("frame task failed")?
}

/// Poll until `shutdown` resolves, writing each changed frame to `out`.
///
/// Returns the number of frames written.
pub async fn follow<W, F>(options: &FollowOptions, out: &mut W, shutdown: F) -> Result<usize>
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut interval = time::interval(options.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut last: Option<String> = None;
    let mut written = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(frames = written, "follow interrupted");
                break;
            }
            _ = interval.tick() => {
                let current = frame_blocking(options).await?;
                if last.as_deref() == Some(current.as_str()) {
                    continue;
                }
                if !options.json {
                    let stamp = format!("--- {} ---", Local::now().format("%H:%M:%S"));
                    writeln!(out, "{}", stamp.dimmed()).context("write frame")?;
                }
                out.write_all(current.as_bytes()).context("write frame")?;
                out.flush().context("flush frame")?;
                debug!(bytes = current.len(), "frame written");
                written += 1;
                last = Some(current);
            }
        }
    }
    out.flush().context("flush output")?;
    Ok(written)
}
