//! Read-only monitor for pipeline runs: one snapshot, or follow until Ctrl-C.

mod follow;
mod render;
mod snapshot;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use colored::Colorize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pipeline::exit_codes;
use pipeline::io::config::load_config;
use pipeline::io::paths::PipelinePaths;

use crate::follow::{FollowOptions, follow, frame};

#[derive(Parser, Debug)]
#[command(name = "pipeline-monitor", version)]
#[command(about = "Read-only view of pipeline run state")]
struct Args {
    /// Base directory containing `.pipeline/`.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Session to show (defaults to the most recently started).
    #[arg(long)]
    session: Option<String>,

    /// Print single-line JSON instead of the terminal view.
    #[arg(long)]
    json: bool,

    /// Keep polling and print each change until interrupted.
    #[arg(long)]
    follow: bool,

    /// Poll interval in milliseconds (defaults to `[monitor] poll_interval_ms`).
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => exit_with_usage_error(&err),
    };

    let code = match run(args).await {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn exit_with_usage_error(err: &clap::Error) -> ! {
    if matches!(
        err.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    ) {
        print!("{err}");
        std::process::exit(exit_codes::OK);
    }
    let rendered = err.to_string();
    let message = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ");
    eprintln!("{} {message}", "error:".red().bold());
    eprintln!("Run 'pipeline-monitor --help' for usage.");
    std::process::exit(exit_codes::INVALID);
}

async fn run(args: Args) -> Result<()> {
    let interval = match args.interval_ms {
        Some(0) => anyhow::bail!("--interval-ms must be > 0"),
        Some(ms) => Duration::from_millis(ms),
        None => load_config(&PipelinePaths::new(&args.root).config_path)?
            .monitor
            .poll_interval(),
    };
    let options = FollowOptions {
        root: args.root,
        session_id: args.session,
        json: args.json,
        interval,
    };

    let mut stdout = io::stdout().lock();
    if !args.follow {
        stdout.write_all(frame(&options)?.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    info!(
        root = %options.root.display(),
        interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        "following run state"
    );
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(err = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    follow(&options, &mut stdout, shutdown).await?;
    Ok(())
}
