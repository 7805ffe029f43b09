//! TimingCore - drift-correcting capture scheduling
//!
//! Triggers a repeating action at a fixed target interval over runs lasting
//! hours to days, where each iteration takes a variable amount of time and
//! the wall clock may be stepped by NTP.
//!
//! # Core Concepts
//!
//! - **Monotonic Deadlines**: every decision uses the monotonic clock
//! - **Bounded Correction**: accumulated drift shifts the next deadline by at most half an interval
//! - **Observed, Not Obeyed**: wall-clock jumps are counted and logged, never acted on
//! - **One Driver, Many Readers**: the controller is `&mut` to drive, [`TimingHandle`] to read
//!
//! # Example
//!
//! ```ignore
//! use timingcore::{TimingController, shutdown_channel};
//!
//! let mut controller = TimingController::with_interval(30.0)?;
//! let (_trigger, shutdown) = shutdown_channel();
//! loop {
//!     let outcome = controller.wait_for_next_capture(&shutdown).await?;
//!     if !outcome.should_capture {
//!         break;
//!     }
//!     capture().await;
//!     controller.capture_completed()?;
//! }
//! controller.log_timing_report()?;
//! ```

pub mod clock;
pub mod error;
pub mod shutdown;
pub mod timing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TimingError};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
pub use timing::{
    CaptureRecord, ClockAdjustment, DriftInfo, INTERVAL_HISTORY_CAPACITY, TimingConfig, TimingController,
    TimingHandle, TimingStats, WaitOutcome, drift_correction,
};
