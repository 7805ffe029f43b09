//! Timing controller configuration

use serde::{Deserialize, Serialize};

/// Timing controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimingConfig {
    /// Target period between captures in seconds
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,

    /// Drift threshold reported alongside stats (seconds)
    #[serde(default = "default_max_drift_threshold")]
    pub max_drift_threshold: f64,

    /// Log every detected clock adjustment at DEBUG
    #[serde(default)]
    pub suppress_drift_warnings: bool,

    /// Clock adjustments logged at WARN before downgrading to INFO
    #[serde(default = "default_max_drift_warnings")]
    pub max_drift_warnings: u64,
}

fn default_interval_seconds() -> f64 {
    30.0
}

fn default_max_drift_threshold() -> f64 {
    1.0
}

fn default_max_drift_warnings() -> u64 {
    3
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_drift_threshold: default_max_drift_threshold(),
            suppress_drift_warnings: false,
            max_drift_warnings: default_max_drift_warnings(),
        }
    }
}

impl TimingConfig {
    /// Defaults with the given interval
    pub fn with_interval(interval_seconds: f64) -> Self {
        Self {
            interval_seconds,
            ..Default::default()
        }
    }

    /// Sleep slice used while waiting: a tenth of the interval, at most 1s
    pub fn sleep_slice(&self) -> f64 {
        sleep_slice_for(self.interval_seconds)
    }
}

pub(crate) fn sleep_slice_for(interval_seconds: f64) -> f64 {
    (interval_seconds / 10.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TimingConfig::default();
        assert_eq!(config.interval_seconds, 30.0);
        assert_eq!(config.max_drift_threshold, 1.0);
        assert!(!config.suppress_drift_warnings);
        assert_eq!(config.max_drift_warnings, 3);
    }

    #[test]
    fn test_sleep_slice() {
        assert_eq!(TimingConfig::with_interval(30.0).sleep_slice(), 1.0);
        assert_eq!(TimingConfig::with_interval(5.0).sleep_slice(), 0.5);
        assert!((TimingConfig::with_interval(0.1).sleep_slice() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: TimingConfig = serde_yaml::from_str("interval-seconds: 5\nsuppress-drift-warnings: true\n").unwrap();
        assert_eq!(config.interval_seconds, 5.0);
        assert!(config.suppress_drift_warnings);
        assert_eq!(config.max_drift_warnings, 3);
        assert_eq!(config.max_drift_threshold, 1.0);
    }
}
