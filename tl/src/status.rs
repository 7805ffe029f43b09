//! Periodic status line from timing snapshots
//!
//! Runs beside the capture loop and only reads; it never takes part in
//! scheduling decisions.

use std::time::Duration;

use timingcore::{ShutdownSignal, TimingError, TimingHandle};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Polls a [`TimingHandle`] and logs a one-line status
#[derive(Clone)]
pub struct StatusReporter {
    handle: TimingHandle,
    period: Duration,
    /// Session length, for the remaining-time field
    duration: Option<Duration>,
}

impl StatusReporter {
    pub fn new(handle: TimingHandle, period: Duration) -> Self {
        debug!(?period, "StatusReporter::new: called");
        Self {
            handle,
            period,
            duration: None,
        }
    }

    /// Show time remaining against this session length
    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// Current status, e.g.
    /// `Captures: 12 | Elapsed: 0.1h | Remaining: 23.9h | Next: 28s | Avg: 30.002s | Drift: 0.1% | Clock adj: 0`
    ///
    /// `Remaining` is only shown when a session length is set.
    pub fn status_line(&self) -> Result<String, TimingError> {
        let stats = self.handle.get_timing_stats()?;
        let drift = self.handle.get_drift_info();

        let next = if stats.time_until_next > 0.0 {
            format!("{:.0}s", stats.time_until_next)
        } else {
            "NOW".to_string()
        };

        let mut line = format!("Captures: {} | Elapsed: {:.1}h", stats.capture_count, stats.elapsed / 3600.0);
        if let Some(duration) = self.duration {
            let remaining = (duration.as_secs_f64() - stats.elapsed).max(0.0);
            line.push_str(&format!(" | Remaining: {:.1}h", remaining / 3600.0));
        }
        line.push_str(&format!(
            " | Next: {} | Avg: {:.3}s | Drift: {:.1}% | Clock adj: {}",
            next, stats.avg_interval, drift.drift_percentage, stats.system_clock_adjustments
        ));
        Ok(line)
    }

    /// Log the status every period until shutdown
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.requested() => {
                        debug!("StatusReporter: shutdown requested, stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.status_line() {
                            Ok(line) => info!("{}", line),
                            Err(e) => warn!(error = %e, "Failed to read timing stats"),
                        }
                    }
                }
            }
        })
    }
}
