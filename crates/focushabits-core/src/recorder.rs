//! Persisting session outcomes.
//!
//! The coordinator performs no I/O. Whoever owns it turns a stop or a
//! `CountdownCompleted` event into records through a [`SessionRecorder`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::events::Event;
use crate::timer::{SessionKind, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Interrupted => "interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "paused" => Some(SessionStatus::Paused),
            "completed" => Some(SessionStatus::Completed),
            "interrupted" => Some(SessionStatus::Interrupted),
            _ => None,
        }
    }
}

/// A finished (or interrupted) focus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub planned_duration_secs: f64,
    pub actual_duration_secs: f64,
    pub status: SessionStatus,
    pub label: Option<String>,
    pub note: Option<String>,
}

impl SessionRecord {
    pub fn new(
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        planned_duration_secs: f64,
        actual_duration_secs: f64,
        status: SessionStatus,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            ended_at: Some(ended_at),
            planned_duration_secs,
            actual_duration_secs,
            status,
            label: None,
            note: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.is_empty()).then_some(label);
        self
    }

    /// Build the `Completed` record for a `CountdownCompleted` event.
    pub fn from_completion(event: &Event) -> Option<Self> {
        let Event::CountdownCompleted {
            planned_duration_secs,
            elapsed_secs,
            title,
            started_at,
            at,
        } = event
        else {
            return None;
        };

        let started_at = started_at.unwrap_or_else(|| *at - secs_duration(*elapsed_secs));
        Some(
            Self::new(
                started_at,
                *at,
                *planned_duration_secs,
                *elapsed_secs,
                SessionStatus::Completed,
            )
            .with_label(title.clone()),
        )
    }

    /// actual / planned, capped at 1; 0 without a plan.
    pub fn completion_ratio(&self) -> f64 {
        if self.planned_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.actual_duration_secs / self.planned_duration_secs).min(1.0)
    }
}

/// Storage for session outcomes.
pub trait SessionRecorder {
    fn record_session(&mut self, record: &SessionRecord) -> Result<()>;

    /// Add timer seconds to a task's running total.
    fn add_task_time(&mut self, task_id: &str, secs: f64) -> Result<()>;

    /// Add timer seconds to a habit's log for `date`.
    fn add_habit_time(&mut self, habit_id: &str, date: NaiveDate, secs: f64) -> Result<()>;
}

/// What happened to a manually stopped session.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Pomodoro stopped early and long enough to keep.
    Interrupted(SessionRecord),
    /// Pomodoro stopped too early to be worth a record.
    Discarded { elapsed_secs: f64 },
    TaskTime { task_id: String, secs: f64 },
    HabitTime { habit_id: String, date: NaiveDate, secs: f64 },
}

/// Persist a manual stop.
///
/// `state` is the session as it was right before `stop_timer()`; `elapsed_secs`
/// is what `stop_timer()` returned. Interrupted Pomodoros shorter than
/// `min_interruption_secs` are dropped.
pub fn record_stop(
    recorder: &mut dyn SessionRecorder,
    state: &SessionState,
    elapsed_secs: f64,
    ended_at: DateTime<Utc>,
    today: NaiveDate,
    min_interruption_secs: f64,
) -> Result<Option<StopOutcome>> {
    let Some(kind) = &state.kind else {
        return Ok(None);
    };

    let outcome = match kind {
        SessionKind::Pomodoro => {
            if elapsed_secs <= min_interruption_secs {
                debug!(elapsed_secs, "short pomodoro not recorded");
                StopOutcome::Discarded { elapsed_secs }
            } else {
                let started_at = state
                    .session_started_at
                    .unwrap_or_else(|| ended_at - secs_duration(elapsed_secs));
                let record = SessionRecord::new(
                    started_at,
                    ended_at,
                    state.target_duration_secs,
                    elapsed_secs,
                    SessionStatus::Interrupted,
                )
                .with_label(state.title.clone());
                recorder.record_session(&record)?;
                StopOutcome::Interrupted(record)
            }
        }
        SessionKind::Task { task_id } => {
            recorder.add_task_time(task_id, elapsed_secs)?;
            StopOutcome::TaskTime {
                task_id: task_id.clone(),
                secs: elapsed_secs,
            }
        }
        SessionKind::Habit { habit_id } => {
            recorder.add_habit_time(habit_id, today, elapsed_secs)?;
            StopOutcome::HabitTime {
                habit_id: habit_id.clone(),
                date: today,
                secs: elapsed_secs,
            }
        }
    };
    Ok(Some(outcome))
}

/// Persist a countdown completion. Returns the stored record, or `None` for
/// any other event.
pub fn record_completion(
    recorder: &mut dyn SessionRecorder,
    event: &Event,
) -> Result<Option<SessionRecord>> {
    let Some(record) = SessionRecord::from_completion(event) else {
        return Ok(None);
    };
    recorder.record_session(&record)?;
    Ok(Some(record))
}

/// Recorder that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    pub sessions: Vec<SessionRecord>,
    pub task_time: HashMap<String, f64>,
    pub habit_time: HashMap<(String, NaiveDate), f64>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRecorder for MemoryRecorder {
    fn record_session(&mut self, record: &SessionRecord) -> Result<()> {
        self.sessions.push(record.clone());
        Ok(())
    }

    fn add_task_time(&mut self, task_id: &str, secs: f64) -> Result<()> {
        *self.task_time.entry(task_id.to_string()).or_default() += secs;
        Ok(())
    }

    fn add_habit_time(&mut self, habit_id: &str, date: NaiveDate, secs: f64) -> Result<()> {
        *self
            .habit_time
            .entry((habit_id.to_string(), date))
            .or_default() += secs;
        Ok(())
    }
}

fn secs_duration(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}
