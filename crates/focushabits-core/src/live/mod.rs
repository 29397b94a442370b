//! Live status broadcasting.
//!
//! While a session is active its state is mirrored to an always-visible
//! display surface (lock screen widget, status bar, status file). The surface
//! is an external sink; this module owns the channel lifecycle and the
//! snapshot format, never the rendering.

mod broadcaster;
mod sinks;

pub use broadcaster::LiveStatusBroadcaster;
pub use sinks::{NullSink, RecordingSink, SinkCall, StatusFileSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BroadcastError;
use crate::timer::format_clock;

/// State pushed to the live status surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub elapsed_secs: f64,
    pub remaining_secs: f64,
    pub target_duration_secs: f64,
    pub is_running: bool,
    pub is_countdown_mode: bool,
    pub title: String,
    pub color: String,
    pub kind_label: String,
    pub updated_at: DateTime<Utc>,
}

impl LiveSnapshot {
    pub fn progress(&self) -> f64 {
        if self.target_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.elapsed_secs / self.target_duration_secs).min(1.0)
    }

    /// Remaining time in countdown mode, elapsed time otherwise.
    pub fn formatted_time(&self) -> String {
        if self.is_countdown_mode {
            format_clock(self.remaining_secs)
        } else {
            format_clock(self.elapsed_secs)
        }
    }

    /// The form sent with `end`: nothing left, not running.
    pub fn finalized(&self) -> Self {
        Self {
            remaining_secs: 0.0,
            is_running: false,
            ..self.clone()
        }
    }
}

/// An external display surface for live session status.
///
/// Implementations may fail (surface disabled, unsupported, I/O); the
/// broadcaster treats every failure as non-fatal.
pub trait LiveStatusSink: Send {
    fn begin(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError>;
    fn update(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError>;
    fn end(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError>;
}

#[cfg(test)]
pub(crate) fn sample_snapshot(elapsed_secs: f64) -> LiveSnapshot {
    LiveSnapshot {
        elapsed_secs,
        remaining_secs: (1500.0 - elapsed_secs).max(0.0),
        target_duration_secs: 1500.0,
        is_running: true,
        is_countdown_mode: true,
        title: "Focus".into(),
        color: "#FF6B6B".into(),
        kind_label: "Pomodoro".into(),
        updated_at: Utc::now(),
    }
}
