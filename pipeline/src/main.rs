//! Operator CLI over the run registry, metrics, phase gate, and classifier.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use pipeline::core::classifier::classify;
use pipeline::core::types::SessionStatus;
use pipeline::error::PipelineError;
use pipeline::exit_codes;
use pipeline::io::config::load_config;
use pipeline::io::gate::{validate_phase, validate_phase_safe};
use pipeline::io::init::{InitOptions, init_pipeline};
use pipeline::io::paths::PipelinePaths;
use pipeline::io::session_store::SessionStore;
use pipeline::logging;
use pipeline::session::{finish_session, start_session};

#[derive(Parser, Debug)]
#[command(
    name = "pipeline",
    version,
    about = "Run registry, attempt metrics, and phase gating for assessment pipelines"
)]
struct Cli {
    /// Base directory containing `.pipeline/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create `.pipeline/` and write the default `config.toml`.
    Init {
        /// Replace an existing config with defaults.
        #[arg(short, long)]
        force: bool,
    },
    /// Register a new run and initialize its metrics document.
    Start {
        /// Target URL.
        #[arg(long)]
        url: String,
        /// Repository path; at most one in-progress run per repository.
        #[arg(long)]
        repo: String,
        /// Output directory (defaults to `.pipeline/runs/<id>`).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Mark a run completed or failed.
    Finish {
        id: String,
        #[arg(long, value_enum)]
        status: FinishStatus,
    },
    /// List registered runs.
    Sessions {
        #[arg(long)]
        json: bool,
    },
    /// Check that a phase produced a consistent deliverable/queue pair.
    Gate {
        phase: String,
        /// Working directory containing `deliverables/`.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Classify a failure message and show its backoff delay.
    Classify {
        message: String,
        #[arg(long, default_value_t = 1)]
        attempt: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FinishStatus {
    Completed,
    Failed,
}

impl From<FinishStatus> for SessionStatus {
    fn from(status: FinishStatus) -> Self {
        match status {
            FinishStatus::Completed => SessionStatus::Completed,
            FinishStatus::Failed => SessionStatus::Failed,
        }
    }
}

fn main() {
    logging::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => exit_with_usage_error(&err),
    };

    let code = match run(cli) {
        Ok(code) => code,
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
    eprintln!("Run 'pipeline --help' for usage.");
    std::process::exit(exit_codes::INVALID);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Start { url, repo, output } => cmd_start(&cli.root, &url, &repo, output.as_deref()),
        Command::Finish { id, status } => cmd_finish(&cli.root, &id, status.into()),
        Command::Sessions { json } => cmd_sessions(&cli.root, json),
        Command::Gate { phase, dir, json } => cmd_gate(&phase, &dir, json),
        Command::Classify { message, attempt } => cmd_classify(&cli.root, &message, attempt),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let outcome = init_pipeline(root, &InitOptions { force })?;
    let config = outcome.paths.config_path.display();
    if outcome.config_written {
        println!("wrote {config}");
    } else {
        println!("kept {config} (use --force to reset)");
    }
    Ok(exit_codes::OK)
}

fn cmd_start(root: &Path, url: &str, repo: &str, output: Option<&Path>) -> Result<i32> {
    match start_session(root, url, repo, output) {
        Ok(outcome) => {
            println!("{}", outcome.session.id);
            println!("output: {}", outcome.output_dir.display());
            Ok(exit_codes::OK)
        }
        Err(err) => {
            if let Some(PipelineError::Validation {
                conflicting_session: Some(existing),
                ..
            }) = err.downcast_ref::<PipelineError>()
            {
                eprintln!("{} {err}", "error:".red().bold());
                eprintln!("Finish session {existing} before starting a new run.");
                return Ok(exit_codes::INVALID);
            }
            Err(err)
        }
    }
}

fn cmd_finish(root: &Path, id: &str, status: SessionStatus) -> Result<i32> {
    let session = finish_session(root, id, status)?;
    println!("{} {}", session.id, colorize_status(session.status));
    Ok(exit_codes::OK)
}

fn cmd_sessions(root: &Path, json: bool) -> Result<i32> {
    let registry = SessionStore::new(root).load();
    if json {
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(exit_codes::OK);
    }
    if registry.sessions.is_empty() {
        println!("{}", "No sessions".dimmed());
        return Ok(exit_codes::OK);
    }
    for session in &registry.sessions {
        println!(
            "{}  {}  {}  {}  {}",
            session.id,
            colorize_status(session.status),
            session.started_at.format("%Y-%m-%d %H:%M:%S"),
            session.repo_path,
            session.web_url.dimmed()
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_gate(phase: &str, dir: &Path, json: bool) -> Result<i32> {
    if json {
        let report = validate_phase_safe(phase, dir);
        println!("{}", serde_json::to_string(&report)?);
        return Ok(if report.success {
            exit_codes::OK
        } else {
            exit_codes::GATE_FAILED
        });
    }
    match validate_phase(phase, dir) {
        Ok(decision) => {
            let verdict = if decision.should_exploit {
                "exploit".green().bold()
            } else {
                "skip".yellow().bold()
            };
            println!(
                "{phase}: {verdict} ({} vulnerabilities)",
                decision.vulnerability_count
            );
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{} {err}", "gate failed:".red().bold());
            Ok(exit_codes::GATE_FAILED)
        }
    }
}

fn cmd_classify(root: &Path, message: &str, attempt: u32) -> Result<i32> {
    let config = load_config(&PipelinePaths::new(root).config_path)?;
    let classification = classify(message);
    let delay = config
        .retry
        .backoff_policy()
        .delay_with_jitter(message, attempt, 0.0);
    println!("category: {:?}", classification.category);
    println!("retryable: {}", classification.retryable);
    println!("delay_ms: {}", delay.as_millis());
    Ok(exit_codes::OK)
}

fn colorize_status(status: SessionStatus) -> colored::ColoredString {
    match status {
        SessionStatus::Completed => status.as_str().green(),
        SessionStatus::Failed => status.as_str().red(),
        SessionStatus::InProgress => status.as_str().yellow(),
    }
}
