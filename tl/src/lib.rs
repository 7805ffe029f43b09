//! Timelapse - unattended capture runner
//!
//! Drives a [`timingcore::TimingController`] from a capture loop: wait for the
//! deadline, run the capture action, report completion, repeat. Stats are
//! read concurrently by a status reporter.
//!
//! # Modules
//!
//! - [`session`] - The capture loop and its stop conditions
//! - [`action`] - Capture actions (external command, dry run)
//! - [`status`] - Periodic status line from timing snapshots
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod action;
pub mod cli;
pub mod config;
pub mod session;
pub mod status;

pub use action::{ActionError, CaptureAction, CaptureOutcome, CommandAction, DryRunAction};
pub use config::Config;
pub use session::{Session, SessionLimits, SessionSummary, StopReason};
pub use status::StatusReporter;
