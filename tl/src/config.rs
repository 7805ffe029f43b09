//! Timelapse configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use timingcore::TimingConfig;

use crate::session::SessionLimits;

/// Main timelapse configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run length and capture limits
    pub timelapse: TimelapseConfig,

    /// Interval and drift handling
    pub timing: TimingConfig,

    /// How each capture is performed
    pub capture: CaptureConfig,

    /// Progress and status output
    pub reporting: ReportingConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let interval = self.timing.interval_seconds;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(eyre::eyre!(
                "timing.interval-seconds must be greater than 0 (got {})",
                interval
            ));
        }
        if !self.timelapse.duration_hours.is_finite() || self.timelapse.duration_hours < 0.0 {
            return Err(eyre::eyre!(
                "timelapse.duration-hours must be a non-negative number, 0 = indefinite (got {})",
                self.timelapse.duration_hours
            ));
        }
        if Duration::try_from_secs_f64(self.timelapse.duration_hours * 3600.0).is_err() {
            return Err(eyre::eyre!(
                "timelapse.duration-hours is too large (got {})",
                self.timelapse.duration_hours
            ));
        }
        if self.reporting.report_every == 0 {
            return Err(eyre::eyre!("reporting.report-every must be at least 1"));
        }
        let status_interval = self.reporting.status_interval_secs;
        if !status_interval.is_finite() || status_interval <= 0.0 {
            return Err(eyre::eyre!("reporting.status-interval-secs must be greater than 0"));
        }
        if Duration::try_from_secs_f64(status_interval).is_err() {
            return Err(eyre::eyre!(
                "reporting.status-interval-secs is too large (got {})",
                status_interval
            ));
        }
        if !self.capture.dry_run && self.capture.command.trim().is_empty() {
            return Err(eyre::eyre!("capture.command must be set unless capture.dry-run is enabled"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .timelapse.yml
        let local_config = PathBuf::from(".timelapse.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/timelapse/timelapse.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("timelapse").join("timelapse.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(
        &mut self,
        interval: Option<f64>,
        duration_hours: Option<f64>,
        max_captures: Option<u64>,
        dry_run: bool,
    ) {
        if let Some(interval) = interval {
            self.timing.interval_seconds = interval;
        }
        if let Some(hours) = duration_hours {
            self.timelapse.duration_hours = hours;
        }
        if max_captures.is_some() {
            self.timelapse.max_captures = max_captures;
        }
        if dry_run {
            self.capture.dry_run = true;
        }
    }

    /// Session stop conditions derived from the timelapse section
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            duration: self.timelapse.duration(),
            max_captures: self.timelapse.max_captures,
        }
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

/// Run length configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimelapseConfig {
    /// Run length in hours; 0 runs until stopped
    pub duration_hours: f64,

    /// Stop after this many capture attempts
    pub max_captures: Option<u64>,
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            duration_hours: 24.0,
            max_captures: None,
        }
    }
}

impl TimelapseConfig {
    /// Run length, or None for an indefinite run
    ///
    /// Values too large for a `Duration` are rejected by [`Config::validate`].
    pub fn duration(&self) -> Option<Duration> {
        if self.duration_hours > 0.0 {
            Duration::try_from_secs_f64(self.duration_hours * 3600.0).ok()
        } else {
            None
        }
    }
}

/// Capture action configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CaptureConfig {
    /// Log captures instead of running the command
    pub dry_run: bool,

    /// Program run once per capture
    pub command: String,

    /// Arguments; `{n}` and `{timestamp}` are substituted per capture
    pub args: Vec<String>,

    /// Directory the command runs in
    pub working_dir: Option<PathBuf>,

    /// Kill the command if it runs longer than this
    pub timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            command: "libcamera-still".to_string(),
            args: vec![
                "--nopreview".to_string(),
                "-o".to_string(),
                "timelapse_{timestamp}_{n}.jpg".to_string(),
            ],
            working_dir: None,
            timeout_secs: 30,
        }
    }
}

impl CaptureConfig {
    /// Command timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Progress reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReportingConfig {
    /// Log a progress summary every N captures
    pub report_every: u64,

    /// How often the status reporter polls timing stats
    pub status_interval_secs: f64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            report_every: 10,
            status_interval_secs: 2.0,
        }
    }
}

impl ReportingConfig {
    /// Status poll period as a Duration, falling back to 2s when out of range
    pub fn status_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.status_interval_secs.max(0.001)).unwrap_or(Duration::from_secs(2))
    }
}
