//! Drift-correcting periodic scheduler
//!
//! The controller tracks the actual interval of every iteration, accumulates
//! the signed error against the target, and pulls the next deadline back (or
//! pushes it out) by that error, bounded to half an interval.

mod config;
mod core;
mod stats;

pub use config::TimingConfig;
pub use self::core::{
    CLOCK_JUMP_THRESHOLD_SECS, MAX_CORRECTION_FRACTION, TimingController, TimingHandle, drift_correction,
};
pub use stats::{CaptureRecord, ClockAdjustment, DriftInfo, INTERVAL_HISTORY_CAPACITY, TimingStats, WaitOutcome};
