//! Snapshot and result types returned by the timing controller

use serde::{Deserialize, Serialize};
use tracing::Level;

/// Capacity of the interval history ring
pub const INTERVAL_HISTORY_CAPACITY: usize = 100;

/// Immutable snapshot of timing statistics
///
/// Timestamps are monotonic-clock seconds. `min_interval` and `max_interval`
/// cover every capture of the session while `interval_history` and
/// `avg_interval` cover only the last [`INTERVAL_HISTORY_CAPACITY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub expected_interval: f64,
    /// Time since the last capture, measured when the snapshot was taken
    pub actual_interval: f64,
    pub drift_accumulated: f64,
    pub total_drift: f64,
    pub capture_count: u64,
    pub start_time: f64,
    pub last_capture_time: f64,
    pub next_capture_time: f64,
    pub elapsed: f64,
    pub time_until_next: f64,
    pub system_clock_adjustments: u64,
    pub avg_interval: f64,
    pub min_interval: f64,
    pub max_interval: f64,
    pub interval_history: Vec<f64>,
}

/// Drift summary for status lines and dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftInfo {
    pub current_drift: f64,
    pub total_drift: f64,
    pub avg_drift_per_capture: f64,
    /// Accumulated drift as a percentage of the interval
    pub drift_percentage: f64,
    pub max_drift_threshold: f64,
    pub system_clock_adjustments: u64,
    pub drift_warnings_suppressed: bool,
    pub drift_warning_count: u64,
}

/// Result of waiting for the next deadline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitOutcome {
    /// False only when the wait was cancelled
    pub should_capture: bool,
    /// Seconds left until the deadline; 0 when it is time to capture
    pub time_until_next: f64,
}

impl WaitOutcome {
    pub(crate) fn ready() -> Self {
        Self {
            should_capture: true,
            time_until_next: 0.0,
        }
    }

    pub(crate) fn cancelled(time_until_next: f64) -> Self {
        Self {
            should_capture: false,
            time_until_next: time_until_next.max(0.0),
        }
    }
}

/// What `capture_completed` measured and scheduled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub capture_number: u64,
    pub actual_interval: f64,
    pub drift: f64,
    /// Offset applied to the next deadline, within half an interval
    pub correction: f64,
    pub time_until_next: f64,
}

/// A detected wall-clock step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAdjustment {
    /// Signed size of the step in seconds
    pub jump: f64,
    /// Value of the warning counter after this detection
    pub warning_number: u64,
    /// Level the detection was logged at
    pub level: Level,
}
