//! Time sources
//!
//! Scheduling runs entirely on the monotonic clock. The wall clock is sampled
//! only to notice external adjustments such as an NTP step.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, TimingError};

/// A pair of monotonic and wall time sources plus a way to wait on them
#[async_trait]
pub trait Clock: Send + Sync {
    /// Seconds since an arbitrary fixed origin; never decreases
    fn monotonic(&self) -> Result<f64>;

    /// Seconds since the Unix epoch; may jump in either direction
    fn wall(&self) -> Result<f64>;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// The host clocks
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn monotonic(&self) -> Result<f64> {
        Ok(self.origin.elapsed().as_secs_f64())
    }

    fn wall(&self) -> Result<f64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .map_err(|e| TimingError::ClockRead(format!("wall clock before Unix epoch: {}", e)))
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct ManualTime {
    monotonic: f64,
    wall: f64,
}

/// Deterministic clock for simulations and tests
///
/// Sleeping advances both clocks immediately and yields to the runtime. Clones
/// share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<ManualTime>>,
}

impl ManualClock {
    /// Start at monotonic 0 and the given wall time
    pub fn new(wall_start: f64) -> Self {
        debug!(wall_start, "ManualClock::new: called");
        Self {
            time: Arc::new(Mutex::new(ManualTime {
                monotonic: 0.0,
                wall: wall_start,
            })),
        }
    }

    /// Let `secs` of real time pass on both clocks
    pub fn advance(&self, secs: f64) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        time.monotonic += secs.max(0.0);
        time.wall += secs.max(0.0);
    }

    /// Step only the wall clock, as an NTP correction would
    pub fn jump_wall(&self, secs: f64) {
        debug!(secs, "ManualClock::jump_wall: called");
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        time.wall += secs;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_700_000_000.0)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn monotonic(&self) -> Result<f64> {
        Ok(self.time.lock().unwrap_or_else(PoisonError::into_inner).monotonic)
    }

    fn wall(&self) -> Result<f64> {
        Ok(self.time.lock().unwrap_or_else(PoisonError::into_inner).wall)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration.as_secs_f64());
        tokio::task::yield_now().await;
    }
}
