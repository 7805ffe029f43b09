//! Capture session: the loop that drives the timing controller
//!
//! Each iteration waits for the next deadline, runs the capture action, and
//! reports completion to the controller whether or not the capture worked.

use std::fmt;
use std::time::Duration;

use timingcore::{DriftInfo, ShutdownSignal, TimingController, TimingError, TimingHandle, TimingStats};
use tracing::{debug, error, info};

use crate::action::CaptureAction;

/// When a session stops on its own
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionLimits {
    /// Stop once this much monotonic time has passed since the session started
    pub duration: Option<Duration>,
    /// Stop after this many capture attempts
    pub max_captures: Option<u64>,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    DurationElapsed,
    MaxCaptures,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Shutdown => write!(f, "shutdown requested"),
            StopReason::DurationElapsed => write!(f, "duration elapsed"),
            StopReason::MaxCaptures => write!(f, "capture limit reached"),
        }
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Capture attempts, successful or not
    pub captures: u64,
    pub failures: u64,
    pub stop_reason: StopReason,
    pub stats: TimingStats,
    pub drift: DriftInfo,
}

impl SessionSummary {
    pub fn successes(&self) -> u64 {
        self.captures - self.failures
    }
}

/// One timelapse run
pub struct Session {
    controller: TimingController,
    action: Box<dyn CaptureAction>,
    shutdown: ShutdownSignal,
    limits: SessionLimits,
    report_every: u64,
}

impl Session {
    pub fn new(controller: TimingController, action: Box<dyn CaptureAction>, shutdown: ShutdownSignal) -> Self {
        debug!(action = action.name(), "Session::new: called");
        Self {
            controller,
            action,
            shutdown,
            limits: SessionLimits::default(),
            report_every: 10,
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Log a progress summary every `n` captures (minimum 1)
    pub fn with_report_every(mut self, n: u64) -> Self {
        self.report_every = n.max(1);
        self
    }

    /// Read-only timing view for status reporters
    pub fn handle(&self) -> TimingHandle {
        self.controller.handle()
    }

    /// Run until shutdown or a limit is reached
    ///
    /// Only clock failures end the run early with an error. Failed captures
    /// are logged and counted.
    pub async fn run(mut self) -> Result<SessionSummary, TimingError> {
        info!(
            action = self.action.name(),
            duration = ?self.limits.duration,
            max_captures = ?self.limits.max_captures,
            "Starting timelapse capture loop"
        );

        let mut captures = 0u64;
        let mut failures = 0u64;

        let stop_reason = loop {
            if self.shutdown.is_requested() {
                break StopReason::Shutdown;
            }
            if self.limits.max_captures.is_some_and(|max| captures >= max) {
                info!(captures, "Reached capture limit. Stopping timelapse.");
                break StopReason::MaxCaptures;
            }
            if let Some(duration) = self.limits.duration {
                let elapsed = self.controller.get_elapsed_time()?;
                if elapsed >= duration.as_secs_f64() {
                    info!(elapsed, "Reached end time. Stopping timelapse.");
                    break StopReason::DurationElapsed;
                }
            }

            let outcome = self.controller.wait_for_next_capture(&self.shutdown).await?;
            if !outcome.should_capture {
                break StopReason::Shutdown;
            }

            captures += 1;
            match self.action.capture(captures).await {
                Ok(outcome) => info!(capture = captures, detail = %outcome.detail, "Captured"),
                Err(e) => {
                    failures += 1;
                    error!(capture = captures, error = %e, "Capture failed");
                }
            }

            // Always, so the schedule stays anchored when a capture fails
            self.controller.capture_completed()?;

            if captures % self.report_every == 0 {
                self.log_progress(captures, failures)?;
            }
        };

        info!(%stop_reason, captures, failures, "Capture loop finished");
        self.controller.log_timing_report()?;

        Ok(SessionSummary {
            captures,
            failures,
            stop_reason,
            stats: self.controller.get_timing_stats()?,
            drift: self.controller.get_drift_info(),
        })
    }

    fn log_progress(&self, captures: u64, failures: u64) -> Result<(), TimingError> {
        let stats = self.controller.get_timing_stats()?;
        let drift = self.controller.get_drift_info();
        info!(
            captures,
            failures,
            avg_interval = stats.avg_interval,
            drift_percent = drift.drift_percentage,
            "Progress: {} captures completed | Timing: {:.3}s avg | Drift: {:.1}%",
            captures,
            stats.avg_interval,
            drift.drift_percentage
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionError, CaptureOutcome, DryRunAction};
    use async_trait::async_trait;
    use std::sync::Arc;
    use timingcore::{ManualClock, ShutdownTrigger, TimingConfig, shutdown_channel};

    fn manual_controller(interval: f64) -> (TimingController, ManualClock) {
        let clock = ManualClock::default();
        let controller = TimingController::with_clock(TimingConfig::with_interval(interval), Arc::new(clock.clone()))
            .expect("valid interval");
        (controller, clock)
    }

    /// Takes `latency` seconds per capture and fails every `fail_every`th one
    struct ScriptedAction {
        clock: ManualClock,
        latency: f64,
        fail_every: u64,
        stop_after: Option<(u64, ShutdownTrigger)>,
    }

    #[async_trait]
    impl CaptureAction for ScriptedAction {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn capture(&mut self, capture_number: u64) -> Result<CaptureOutcome, ActionError> {
            self.clock.advance(self.latency);
            if let Some((stop_at, trigger)) = &self.stop_after
                && capture_number >= *stop_at
            {
                trigger.trigger();
            }
            if self.fail_every > 0 && capture_number % self.fail_every == 0 {
                return Err(ActionError::Failed {
                    program: "camera".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "sensor timeout".to_string(),
                });
            }
            Ok(CaptureOutcome {
                detail: format!("frame {}", capture_number),
            })
        }
    }

    #[tokio::test]
    async fn test_stops_at_max_captures() {
        let (controller, _clock) = manual_controller(1.0);
        let session = Session::new(controller, Box::new(DryRunAction::new()), ShutdownSignal::never()).with_limits(
            SessionLimits {
                duration: None,
                max_captures: Some(5),
            },
        );

        let summary = session.run().await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::MaxCaptures);
        assert_eq!(summary.captures, 5);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.stats.capture_count, 5);
    }

    #[tokio::test]
    async fn test_failed_captures_still_complete() {
        let (controller, clock) = manual_controller(2.0);
        let action = ScriptedAction {
            clock,
            latency: 0.4,
            fail_every: 3,
            stop_after: None,
        };
        let session = Session::new(controller, Box::new(action), ShutdownSignal::never()).with_limits(SessionLimits {
            duration: None,
            max_captures: Some(12),
        });

        let summary = session.run().await.unwrap();
        assert_eq!(summary.captures, 12);
        assert_eq!(summary.failures, 4);
        assert_eq!(summary.successes(), 8);
        // One completion per attempt, failed or not
        assert_eq!(summary.stats.capture_count, 12);
    }

    #[tokio::test]
    async fn test_latency_is_absorbed_by_correction() {
        let (controller, clock) = manual_controller(1.0);
        let action = ScriptedAction {
            clock,
            latency: 0.25,
            fail_every: 0,
            stop_after: None,
        };
        let session = Session::new(controller, Box::new(action), ShutdownSignal::never()).with_limits(SessionLimits {
            duration: None,
            max_captures: Some(40),
        });

        let summary = session.run().await.unwrap();
        assert!(
            (summary.stats.avg_interval - 1.0).abs() < 0.02,
            "avg={}",
            summary.stats.avg_interval
        );
        assert!(summary.drift.current_drift.abs() < 0.3);
    }

    #[tokio::test]
    async fn test_stops_when_duration_elapsed() {
        let (controller, _clock) = manual_controller(1.0);
        let session = Session::new(controller, Box::new(DryRunAction::new()), ShutdownSignal::never()).with_limits(
            SessionLimits {
                duration: Some(Duration::from_secs(10)),
                max_captures: None,
            },
        );

        let summary = session.run().await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::DurationElapsed);
        assert!((10..=11).contains(&summary.captures), "captures={}", summary.captures);
        assert!(summary.stats.elapsed >= 10.0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (controller, clock) = manual_controller(1.0);
        let (trigger, shutdown) = shutdown_channel();
        let action = ScriptedAction {
            clock,
            latency: 0.1,
            fail_every: 0,
            stop_after: Some((3, trigger)),
        };
        let session = Session::new(controller, Box::new(action), shutdown);

        let summary = session.run().await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert_eq!(summary.captures, 3);
        assert_eq!(summary.stats.capture_count, 3);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_captures_nothing() {
        let (controller, _clock) = manual_controller(1.0);
        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();

        let summary = Session::new(controller, Box::new(DryRunAction::new()), shutdown)
            .run()
            .await
            .unwrap();
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert_eq!(summary.captures, 0);
    }

    #[tokio::test]
    async fn test_handle_observes_running_session() {
        let (controller, _clock) = manual_controller(1.0);
        let session = Session::new(controller, Box::new(DryRunAction::new()), ShutdownSignal::never())
            .with_report_every(2)
            .with_limits(SessionLimits {
                duration: None,
                max_captures: Some(4),
            });
        let handle = session.handle();

        session.run().await.unwrap();
        assert_eq!(handle.get_timing_stats().unwrap().capture_count, 4);
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Shutdown.to_string(), "shutdown requested");
        assert_eq!(StopReason::DurationElapsed.to_string(), "duration elapsed");
        assert_eq!(StopReason::MaxCaptures.to_string(), "capture limit reached");
    }
}
