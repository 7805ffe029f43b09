//! Capture actions performed on each scheduled tick

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CaptureConfig;

/// Errors from a single capture attempt
///
/// These are never fatal to a session; the loop logs them and moves on.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// What a successful capture produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub detail: String,
}

/// Something performed once per scheduled tick
#[async_trait]
pub trait CaptureAction: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Perform capture number `capture_number` (1-based)
    async fn capture(&mut self, capture_number: u64) -> Result<CaptureOutcome, ActionError>;
}

/// Build the action described by the capture config
pub fn from_config(config: &CaptureConfig) -> Box<dyn CaptureAction> {
    if config.dry_run {
        Box::new(DryRunAction::new())
    } else {
        Box::new(CommandAction::new(
            config.command.clone(),
            config.args.clone(),
            config.working_dir.clone(),
            config.timeout(),
        ))
    }
}

/// Logs each capture without touching hardware
#[derive(Debug, Default)]
pub struct DryRunAction {
    captures: u64,
}

impl DryRunAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }
}

#[async_trait]
impl CaptureAction for DryRunAction {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn capture(&mut self, capture_number: u64) -> Result<CaptureOutcome, ActionError> {
        self.captures += 1;
        info!(capture = capture_number, "Dry run capture");
        Ok(CaptureOutcome {
            detail: format!("dry run #{}", capture_number),
        })
    }
}

/// Runs an external program per capture, e.g. `libcamera-still`
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandAction {
    pub fn new(program: String, args: Vec<String>, working_dir: Option<PathBuf>, timeout: Duration) -> Self {
        debug!(%program, ?args, ?working_dir, ?timeout, "CommandAction::new: called");
        Self {
            program,
            args,
            working_dir,
            timeout,
        }
    }

    /// Substitute `{n}` (zero-padded capture number) and `{timestamp}` into the arguments
    pub fn render_args(&self, capture_number: u64, timestamp: &str) -> Vec<String> {
        let number = format!("{:06}", capture_number);
        self.args
            .iter()
            .map(|arg| arg.replace("{n}", &number).replace("{timestamp}", timestamp))
            .collect()
    }
}

#[async_trait]
impl CaptureAction for CommandAction {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn capture(&mut self, capture_number: u64) -> Result<CaptureOutcome, ActionError> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let args = self.render_args(capture_number, &timestamp);
        debug!(capture = capture_number, program = %self.program, ?args, "CommandAction::capture: running");

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ActionError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ActionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ActionError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(CaptureOutcome {
            detail: format!("{} {}", self.program, args.join(" ")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(program: &str, args: &[&str], timeout: Duration) -> CommandAction {
        CommandAction::new(
            program.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
            None,
            timeout,
        )
    }

    #[test]
    fn test_render_args() {
        let action = command("cam", &["-o", "shot_{timestamp}_{n}.jpg", "--quality", "95"], Duration::from_secs(1));
        let args = action.render_args(42, "20260101_120000");
        assert_eq!(args, vec!["-o", "shot_20260101_120000_000042.jpg", "--quality", "95"]);
    }

    #[test]
    fn test_from_config_picks_dry_run() {
        let config = CaptureConfig {
            dry_run: true,
            ..Default::default()
        };
        assert_eq!(from_config(&config).name(), "dry-run");
        assert_eq!(from_config(&CaptureConfig::default()).name(), "command");
    }

    #[tokio::test]
    async fn test_dry_run_counts_captures() {
        let mut action = DryRunAction::new();
        let outcome = action.capture(1).await.unwrap();
        action.capture(2).await.unwrap();
        assert_eq!(outcome.detail, "dry run #1");
        assert_eq!(action.captures(), 2);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let mut action = command("definitely-not-a-real-camera-binary", &[], Duration::from_secs(5));
        let err = action.capture(1).await.unwrap_err();
        assert!(matches!(err, ActionError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command() {
        let mut action = command("true", &["{n}"], Duration::from_secs(5));
        let outcome = action.capture(7).await.unwrap();
        assert_eq!(outcome.detail, "true 000007");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let mut action = command("sh", &["-c", "echo no camera >&2; exit 3"], Duration::from_secs(5));
        let err = action.capture(1).await.unwrap_err();
        match err {
            ActionError::Failed { stderr, .. } => assert_eq!(stderr, "no camera"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out() {
        let mut action = command("sleep", &["5"], Duration::from_millis(50));
        let err = action.capture(1).await.unwrap_err();
        assert!(matches!(err, ActionError::Timeout { .. }));
    }
}
