use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What is being timed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionKind {
    Habit { habit_id: String },
    Task { task_id: String },
    Pomodoro,
}

impl SessionKind {
    /// Label shown on the live status surface.
    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Habit { .. } => "Habit timer",
            SessionKind::Task { .. } => "Task timer",
            SessionKind::Pomodoro => "Pomodoro",
        }
    }

    pub fn is_pomodoro(&self) -> bool {
        matches!(self, SessionKind::Pomodoro)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    #[default]
    Idle,
    Running,
    Paused,
}

impl TimerPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, TimerPhase::Running | TimerPhase::Paused)
    }
}

/// In-memory state of the single active session.
///
/// Only [`TimerCoordinator`](super::TimerCoordinator) mutates this; everyone
/// else sees it through `&SessionState` or a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionState {
    pub kind: Option<SessionKind>,
    pub phase: TimerPhase,
    pub elapsed_secs: f64,
    /// 0 means "no target" (count-up).
    pub target_duration_secs: f64,
    pub remaining_secs: f64,
    pub title: String,
    pub color: String,
    /// Anchor of the current running segment; `None` unless running.
    pub started_at: Option<DateTime<Utc>>,
    /// Elapsed time banked by earlier running segments.
    pub accumulated_before_pause: f64,
    /// When the session was first started.
    pub session_started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_countdown_mode(&self) -> bool {
        self.kind.as_ref().is_some_and(SessionKind::is_pomodoro)
    }

    /// 0.0 ..= 1.0 of the target reached; 0 without a target.
    pub fn progress(&self) -> f64 {
        if self.target_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.elapsed_secs / self.target_duration_secs).min(1.0)
    }
}
