//! Wall-clock sources for the timer coordinator.
//!
//! Elapsed time is always derived from the difference between two clock
//! readings, never from counting ticks, so a late or missed tick cannot
//! introduce drift.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of the current wall-clock instant.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually advanced clock for tests and simulations.
///
/// Clones share the same instant, so a test can keep one handle while the
/// coordinator owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `secs` (fractional seconds allowed).
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::microseconds((secs * 1_000_000.0).round() as i64));
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Seconds between two instants as `f64`, clamped at zero.
pub(crate) fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(from);
    let micros = delta.num_microseconds().unwrap_or(i64::MAX);
    (micros as f64 / 1_000_000.0).max(0.0)
}
