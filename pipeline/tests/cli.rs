//! CLI tests for the `pipeline` binary.
//!
//! Spawns the binary against a temp root and checks exit codes and output.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pipeline::exit_codes;
use pipeline::io::session_store::SessionStore;

fn pipeline(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pipeline"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("spawn pipeline")
}

fn start(root: &Path, repo: &str) -> Output {
    pipeline(
        root,
        &["start", "--url", "https://example.com", "--repo", repo],
    )
}

#[test]
fn start_prints_session_id_and_registers_it() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = start(temp.path(), "/repos/app");
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let id = stdout.lines().next().expect("id line").trim();
    let session = SessionStore::new(temp.path()).find(id).expect("registered");
    assert_eq!(session.repo_path, "/repos/app");
    assert!(
        temp.path()
            .join(".pipeline/runs")
            .join(id)
            .join("session.json")
            .is_file()
    );
}

#[test]
fn duplicate_start_exits_invalid_until_finished() {
    let temp = tempfile::tempdir().expect("tempdir");
    let first = start(temp.path(), "/repos/app");
    let id = String::from_utf8_lossy(&first.stdout)
        .lines()
        .next()
        .expect("id")
        .trim()
        .to_string();

    let second = start(temp.path(), "/repos/app");
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&second.stderr).contains(&id));

    let finish = pipeline(temp.path(), &["finish", &id, "--status", "completed"]);
    assert_eq!(finish.status.code(), Some(exit_codes::OK));

    let third = start(temp.path(), "/repos/app");
    assert_eq!(third.status.code(), Some(exit_codes::OK));

    let refinish = pipeline(temp.path(), &["finish", &id, "--status", "failed"]);
    assert_eq!(refinish.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&refinish.stderr).contains("already finished"));
}

#[test]
fn init_writes_default_config_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_path = temp.path().join(".pipeline/config.toml");

    let first = pipeline(temp.path(), &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    assert!(config_path.is_file());
    assert!(temp.path().join(".pipeline/runs").is_dir());

    fs::write(&config_path, "[retry]\nmax_attempts = 5\n").expect("edit config");
    let second = pipeline(temp.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&second.stdout).contains("kept"));
    let contents = fs::read_to_string(&config_path).expect("read config");
    assert!(contents.contains("max_attempts = 5"));
}

#[test]
fn gate_exit_codes_follow_artifacts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().to_str().expect("utf8 path");

    let missing = pipeline(temp.path(), &["gate", "injection", "--dir", dir]);
    assert_eq!(missing.status.code(), Some(exit_codes::GATE_FAILED));
    assert!(String::from_utf8_lossy(&missing.stderr).contains("Neither deliverable nor queue"));

    let deliverables = temp.path().join("deliverables");
    fs::create_dir_all(&deliverables).expect("mkdir");
    fs::write(
        deliverables.join("injection_analysis_deliverable.md"),
        "# findings\n",
    )
    .expect("write deliverable");
    fs::write(
        deliverables.join("injection_exploitation_queue.json"),
        r#"{"vulnerabilities":[{"id":"INJ-1"},{"id":"INJ-2"}]}"#,
    )
    .expect("write queue");

    let ok = pipeline(temp.path(), &["gate", "injection", "--dir", dir, "--json"]);
    assert_eq!(ok.status.code(), Some(exit_codes::OK));
    let report: serde_json::Value =
        serde_json::from_slice(&ok.stdout).expect("json report");
    assert_eq!(report["success"], true);
    assert_eq!(report["data"]["shouldExploit"], true);
    assert_eq!(report["data"]["vulnerabilityCount"], 2);
}

#[test]
fn unknown_subcommand_prints_usage_hint() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = pipeline(temp.path(), &["frobnicate"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error:"));
    assert!(stderr.contains("pipeline --help"));
}

#[test]
fn classify_reports_rate_limit_floor() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = pipeline(temp.path(), &["classify", "HTTP 429 Too Many Requests"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("retryable: true"));
    assert!(stdout.contains("delay_ms: 30000"));
}
