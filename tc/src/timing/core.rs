//! Timing controller implementation

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{Level, debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, validate_interval};
use crate::shutdown::ShutdownSignal;

use super::config::{TimingConfig, sleep_slice_for};
use super::stats::{CaptureRecord, ClockAdjustment, DriftInfo, INTERVAL_HISTORY_CAPACITY, TimingStats, WaitOutcome};

/// Wall-clock step between consecutive samples treated as an external adjustment
pub const CLOCK_JUMP_THRESHOLD_SECS: f64 = 1.0;

/// Largest correction applied to a deadline, as a fraction of the interval
pub const MAX_CORRECTION_FRACTION: f64 = 0.5;

/// Correction for the next deadline: the full negative accumulated drift,
/// clamped to half an interval either way
pub fn drift_correction(drift_accumulated: f64, interval_seconds: f64) -> f64 {
    let max_correction = interval_seconds * MAX_CORRECTION_FRACTION;
    (-drift_accumulated).clamp(-max_correction, max_correction)
}

/// Internal state protected by mutex
struct TimingState {
    interval_seconds: f64,
    max_drift_threshold: f64,
    sleep_slice: f64,

    start_time: f64,
    last_capture_time: f64,
    next_capture_time: f64,

    drift_accumulated: f64,
    total_drift: f64,
    capture_count: u64,

    /// Last N actual intervals
    interval_history: VecDeque<f64>,
    /// All-time extrema, not limited to the history window
    min_interval: f64,
    max_interval: f64,

    system_clock_adjustments: u64,
    drift_warning_count: u64,
    suppress_drift_warnings: bool,
    max_drift_warnings: u64,

    /// Last wall-clock sample and the monotonic time it was taken at
    last_system_time: f64,
    last_system_sample: f64,
}

impl TimingState {
    fn new(config: &TimingConfig, monotonic_now: f64, wall_now: f64) -> Self {
        Self {
            interval_seconds: config.interval_seconds,
            max_drift_threshold: config.max_drift_threshold,
            sleep_slice: sleep_slice_for(config.interval_seconds),
            start_time: monotonic_now,
            last_capture_time: monotonic_now,
            next_capture_time: monotonic_now + config.interval_seconds,
            drift_accumulated: 0.0,
            total_drift: 0.0,
            capture_count: 0,
            interval_history: VecDeque::with_capacity(INTERVAL_HISTORY_CAPACITY),
            min_interval: f64::INFINITY,
            max_interval: 0.0,
            system_clock_adjustments: 0,
            drift_warning_count: 0,
            suppress_drift_warnings: config.suppress_drift_warnings,
            max_drift_warnings: config.max_drift_warnings,
            last_system_time: wall_now,
            last_system_sample: monotonic_now,
        }
    }

    fn record_capture(&mut self, now: f64) -> CaptureRecord {
        let actual_interval = now - self.last_capture_time;

        if self.interval_history.len() == INTERVAL_HISTORY_CAPACITY {
            self.interval_history.pop_front();
        }
        self.interval_history.push_back(actual_interval);
        self.min_interval = self.min_interval.min(actual_interval);
        self.max_interval = self.max_interval.max(actual_interval);

        let drift = actual_interval - self.interval_seconds;
        self.drift_accumulated += drift;
        self.total_drift += drift.abs();
        let correction = drift_correction(self.drift_accumulated, self.interval_seconds);

        self.last_capture_time = now;
        self.next_capture_time = now + self.interval_seconds + correction;
        self.capture_count += 1;

        CaptureRecord {
            capture_number: self.capture_count,
            actual_interval,
            drift,
            correction,
            time_until_next: self.next_capture_time - now,
        }
    }

    fn snapshot(&self, now: f64) -> TimingStats {
        let avg_interval = if self.interval_history.is_empty() {
            0.0
        } else {
            self.interval_history.iter().sum::<f64>() / self.interval_history.len() as f64
        };

        TimingStats {
            expected_interval: self.interval_seconds,
            actual_interval: now - self.last_capture_time,
            drift_accumulated: self.drift_accumulated,
            total_drift: self.total_drift,
            capture_count: self.capture_count,
            start_time: self.start_time,
            last_capture_time: self.last_capture_time,
            next_capture_time: self.next_capture_time,
            elapsed: now - self.start_time,
            time_until_next: (self.next_capture_time - now).max(0.0),
            system_clock_adjustments: self.system_clock_adjustments,
            avg_interval,
            min_interval: if self.min_interval.is_finite() { self.min_interval } else { 0.0 },
            max_interval: self.max_interval,
            interval_history: self.interval_history.iter().copied().collect(),
        }
    }

    fn drift_info(&self) -> DriftInfo {
        DriftInfo {
            current_drift: self.drift_accumulated,
            total_drift: self.total_drift,
            avg_drift_per_capture: self.total_drift / self.capture_count.max(1) as f64,
            drift_percentage: self.drift_accumulated / self.interval_seconds * 100.0,
            max_drift_threshold: self.max_drift_threshold,
            system_clock_adjustments: self.system_clock_adjustments,
            drift_warnings_suppressed: self.suppress_drift_warnings,
            drift_warning_count: self.drift_warning_count,
        }
    }

    fn adjustment_level(&self) -> Level {
        if self.suppress_drift_warnings {
            Level::DEBUG
        } else if self.drift_warning_count <= self.max_drift_warnings {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

struct Shared {
    clock: Arc<dyn Clock>,
    state: Mutex<TimingState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TimingState> {
        // State is plain numbers; a panicked holder cannot leave it unusable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timing_stats(&self) -> Result<TimingStats> {
        let state = self.lock();
        let now = self.clock.monotonic()?;
        Ok(state.snapshot(now))
    }

    fn time_until_next(&self) -> Result<f64> {
        let state = self.lock();
        let now = self.clock.monotonic()?;
        Ok((state.next_capture_time - now).max(0.0))
    }

    fn elapsed_time(&self) -> Result<f64> {
        let state = self.lock();
        let now = self.clock.monotonic()?;
        Ok(now - state.start_time)
    }

    fn drift_info(&self) -> DriftInfo {
        self.lock().drift_info()
    }

    fn log_timing_report(&self) -> Result<()> {
        let (stats, drift) = {
            let state = self.lock();
            let now = self.clock.monotonic()?;
            (state.snapshot(now), state.drift_info())
        };

        info!("=== Timing Accuracy Report ===");
        info!(captures = stats.capture_count, "Captures completed: {}", stats.capture_count);
        info!(
            expected = stats.expected_interval,
            "Expected interval: {:.3}s", stats.expected_interval
        );
        info!(average = stats.avg_interval, "Average interval: {:.3}s", stats.avg_interval);
        info!(
            min = stats.min_interval,
            max = stats.max_interval,
            "Interval range: {:.3}s - {:.3}s",
            stats.min_interval,
            stats.max_interval
        );
        info!(
            drift = stats.drift_accumulated,
            percent = drift.drift_percentage,
            "Current drift: {:.3}s ({:.2}%)",
            stats.drift_accumulated,
            drift.drift_percentage
        );
        info!(total = stats.total_drift, "Total drift: {:.3}s", stats.total_drift);
        info!(
            adjustments = stats.system_clock_adjustments,
            "System clock adjustments: {}", stats.system_clock_adjustments
        );
        info!(elapsed = stats.elapsed, "Elapsed time: {:.1}s", stats.elapsed);
        info!("{}", "=".repeat(30));
        Ok(())
    }
}

/// Drift-correcting periodic scheduler
///
/// Driving methods take `&mut self`, so only one task can drive the schedule.
/// Readers get a [`TimingHandle`] from [`TimingController::handle`].
pub struct TimingController {
    shared: Arc<Shared>,
}

impl TimingController {
    /// Create a controller on the system clocks
    pub fn new(config: TimingConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a controller with default options and the given interval
    pub fn with_interval(interval_seconds: f64) -> Result<Self> {
        Self::new(TimingConfig::with_interval(interval_seconds))
    }

    /// Create a controller on an injected clock
    pub fn with_clock(config: TimingConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        debug!(?config, "TimingController::with_clock: called");
        validate_interval(config.interval_seconds)?;

        let monotonic_now = clock.monotonic()?;
        let wall_now = clock.wall()?;
        let state = TimingState::new(&config, monotonic_now, wall_now);

        let drift_warnings = if config.suppress_drift_warnings { "suppressed" } else { "enabled" };
        info!(
            interval = config.interval_seconds,
            max_drift_threshold = config.max_drift_threshold,
            drift_warnings,
            "Timing controller initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                clock,
                state: Mutex::new(state),
            }),
        })
    }

    /// Read-only handle for stats consumers
    pub fn handle(&self) -> TimingHandle {
        TimingHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Wait until the next deadline or until shutdown is requested
    ///
    /// Sleeps in slices of at most a tenth of the interval (capped at 1s),
    /// checking the wall clock for adjustments after each slice.
    pub async fn wait_for_next_capture(&mut self, shutdown: &ShutdownSignal) -> Result<WaitOutcome> {
        debug!("TimingController::wait_for_next_capture: called");
        self.detect_system_clock_adjustment()?;

        loop {
            let now = self.shared.clock.monotonic()?;
            let (remaining, slice) = {
                let state = self.shared.lock();
                (state.next_capture_time - now, state.sleep_slice)
            };

            if remaining <= 0.0 {
                debug!(overdue = -remaining, "TimingController::wait_for_next_capture: deadline reached");
                return Ok(WaitOutcome::ready());
            }
            if shutdown.is_requested() {
                debug!(remaining, "TimingController::wait_for_next_capture: shutdown requested");
                return Ok(WaitOutcome::cancelled(remaining));
            }

            let nap = Duration::from_secs_f64(slice.min(remaining));
            if nap.is_zero() {
                return Ok(WaitOutcome::ready());
            }

            tokio::select! {
                biased;
                _ = shutdown.requested() => {
                    let remaining = self.shared.time_until_next()?;
                    debug!(remaining, "TimingController::wait_for_next_capture: cancelled during sleep");
                    return Ok(WaitOutcome::cancelled(remaining));
                }
                _ = self.shared.clock.sleep(nap) => {}
            }

            self.detect_system_clock_adjustment()?;
        }
    }

    /// Record that an attempted capture finished and schedule the next one
    ///
    /// Must be called once per attempt whether or not the capture succeeded.
    pub fn capture_completed(&mut self) -> Result<CaptureRecord> {
        let now = self.shared.clock.monotonic()?;
        let record = self.shared.lock().record_capture(now);

        debug!(
            capture = record.capture_number,
            interval = record.actual_interval,
            drift = record.drift,
            correction = record.correction,
            next_in = record.time_until_next,
            "Capture #{}: interval={:.3}s, drift={:.3}s, next_capture={:.1}s",
            record.capture_number,
            record.actual_interval,
            record.drift,
            record.time_until_next
        );
        Ok(record)
    }

    /// Sample the wall clock and report a step since the previous sample
    ///
    /// The step is the wall-clock delta minus the monotonic delta, so time
    /// spent sleeping or capturing between samples is not counted. Detection
    /// only feeds counters and logs; deadlines are never moved.
    pub fn detect_system_clock_adjustment(&mut self) -> Result<Option<ClockAdjustment>> {
        let wall_now = self.shared.clock.wall()?;
        let monotonic_now = self.shared.clock.monotonic()?;

        let adjustment = {
            let mut state = self.shared.lock();
            let wall_delta = wall_now - state.last_system_time;
            let monotonic_delta = monotonic_now - state.last_system_sample;
            state.last_system_time = wall_now;
            state.last_system_sample = monotonic_now;

            let jump = wall_delta - monotonic_delta;
            if jump.abs() <= CLOCK_JUMP_THRESHOLD_SECS {
                return Ok(None);
            }

            state.drift_warning_count += 1;
            state.system_clock_adjustments += 1;
            ClockAdjustment {
                jump,
                warning_number: state.drift_warning_count,
                level: state.adjustment_level(),
            }
        };

        let size = adjustment.jump.abs();
        if adjustment.level == Level::WARN {
            warn!(jump = adjustment.jump, "System clock adjustment detected: {:.2}s jump", size);
        } else if adjustment.level == Level::INFO {
            info!(
                jump = adjustment.jump,
                warning = adjustment.warning_number,
                "System clock adjustment detected: {:.2}s jump (warning #{})",
                size,
                adjustment.warning_number
            );
        } else {
            debug!(
                jump = adjustment.jump,
                "System clock adjustment detected: {:.2}s jump (suppressed)", size
            );
        }

        Ok(Some(adjustment))
    }

    /// Forget accumulated drift and schedule the next capture one interval out
    pub fn reset_drift(&mut self) -> Result<()> {
        info!("Resetting accumulated drift");
        let now = self.shared.clock.monotonic()?;
        let mut state = self.shared.lock();
        state.drift_accumulated = 0.0;
        state.next_capture_time = now + state.interval_seconds;
        Ok(())
    }

    /// Zero the clock-adjustment warning counter so warnings show again
    pub fn reset_drift_warnings(&mut self) {
        debug!("Resetting drift warning counter");
        self.shared.lock().drift_warning_count = 0;
    }

    /// Change the interval; the next capture moves to one new interval from now
    ///
    /// Any pending drift correction is discarded.
    pub fn adjust_interval(&mut self, new_interval: f64) -> Result<()> {
        validate_interval(new_interval)?;
        let now = self.shared.clock.monotonic()?;
        let mut state = self.shared.lock();

        info!(
            from = state.interval_seconds,
            to = new_interval,
            "Adjusting interval from {}s to {}s",
            state.interval_seconds,
            new_interval
        );
        state.interval_seconds = new_interval;
        state.sleep_slice = sleep_slice_for(new_interval);
        state.next_capture_time = now + new_interval;
        Ok(())
    }

    pub fn get_timing_stats(&self) -> Result<TimingStats> {
        self.shared.timing_stats()
    }

    pub fn get_time_until_next(&self) -> Result<f64> {
        self.shared.time_until_next()
    }

    pub fn get_elapsed_time(&self) -> Result<f64> {
        self.shared.elapsed_time()
    }

    pub fn get_drift_info(&self) -> DriftInfo {
        self.shared.drift_info()
    }

    /// Log a human-readable timing summary
    pub fn log_timing_report(&self) -> Result<()> {
        self.shared.log_timing_report()
    }
}

/// Read-only view of a [`TimingController`], cheap to clone and share across threads
#[derive(Clone)]
pub struct TimingHandle {
    shared: Arc<Shared>,
}

impl TimingHandle {
    pub fn get_timing_stats(&self) -> Result<TimingStats> {
        self.shared.timing_stats()
    }

    pub fn get_time_until_next(&self) -> Result<f64> {
        self.shared.time_until_next()
    }

    pub fn get_elapsed_time(&self) -> Result<f64> {
        self.shared.elapsed_time()
    }

    pub fn get_drift_info(&self) -> DriftInfo {
        self.shared.drift_info()
    }

    pub fn log_timing_report(&self) -> Result<()> {
        self.shared.log_timing_report()
    }
}
