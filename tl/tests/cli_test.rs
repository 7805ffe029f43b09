//! CLI tests for the `tl` binary
//!
//! Every test passes an explicit config file and runs in a temp directory so
//! user or project configs on the host never leak in.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("timelapse.yml");
    fs::write(&path, yaml).expect("Failed to write config");
    path
}

#[test]
fn test_help_lists_subcommands() {
    cargo_bin_cmd!("tl")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_dry_run_stops_at_capture_limit() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "timing:\n  interval-seconds: 0.05\n");

    cargo_bin_cmd!("tl")
        .current_dir(temp_dir.path())
        .args(["run", "--dry-run", "--max-captures", "3", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Captures: 3"))
        .stdout(predicate::str::contains("capture limit reached"));
}

#[test]
fn test_zero_interval_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "capture:\n  dry-run: true\n");

    cargo_bin_cmd!("tl")
        .current_dir(temp_dir.path())
        .args(["run", "--interval", "0", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval-seconds must be greater than 0"));
}

#[test]
fn test_oversized_duration_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "capture:\n  dry-run: true\n");

    cargo_bin_cmd!("tl")
        .current_dir(temp_dir.path())
        .args(["run", "--duration", "1e16", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duration-hours is too large"));
}

#[cfg(unix)]
#[test]
fn test_failing_command_still_completes_session() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(
        temp_dir.path(),
        "timing:\n  interval-seconds: 0.05\ncapture:\n  command: \"false\"\n  args: []\n",
    );

    cargo_bin_cmd!("tl")
        .current_dir(temp_dir.path())
        .args(["run", "-n", "2", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Captures: 2"))
        .stdout(predicate::str::contains("Failed:"));
}

#[test]
fn test_config_prints_effective_yaml() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "timing:\n  interval-seconds: 12.5\n");

    cargo_bin_cmd!("tl")
        .current_dir(temp_dir.path())
        .arg("config")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("interval-seconds: 12.5"))
        .stdout(predicate::str::contains("report-every: 10"));
}

#[test]
fn test_config_validate_reports_problems() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "timelapse:\n  duration-hours: -2\n");

    cargo_bin_cmd!("tl")
        .current_dir(temp_dir.path())
        .args(["config", "--validate", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duration-hours"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    cargo_bin_cmd!("tl")
        .current_dir(temp_dir.path())
        .args(["config", "--config", "does-not-exist.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
