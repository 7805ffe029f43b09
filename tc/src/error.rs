//! Timing error types

use thiserror::Error;

/// Errors that abort scheduling
///
/// Only structural problems are errors. Clock jumps and slow iterations are
/// absorbed into counters and logs and never surface here.
#[derive(Debug, Error)]
pub enum TimingError {
    #[error("Interval must be greater than 0 seconds, got {0}")]
    InvalidInterval(f64),

    #[error("Clock read failed: {0}")]
    ClockRead(String),
}

impl TimingError {
    /// Check if this error comes from bad configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, TimingError::InvalidInterval(_))
    }
}

/// Result alias for timing operations
pub type Result<T> = std::result::Result<T, TimingError>;

/// Validate a target interval in seconds
pub(crate) fn validate_interval(interval_seconds: f64) -> Result<f64> {
    if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
        return Err(TimingError::InvalidInterval(interval_seconds));
    }
    Ok(interval_seconds)
}
