//! To-do items whose tracked time comes from the task timer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timer::format_duration_short;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            TaskPriority::Low => "#A8E6CF",
            TaskPriority::Medium => "#FFD93D",
            TaskPriority::High => "#FF8B94",
            TaskPriority::Urgent => "#FF6B6B",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            _ => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("unknown priority '{s}'"),
            }),
        }
    }
}

/// Completion state of one subtask, saved when its parent is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskState {
    pub id: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    /// Accumulated timer seconds.
    pub time_spent_secs: f64,
    pub color: String,
    pub archived: bool,
    pub parent_id: Option<String>,
    /// Subtask states from before the last cascade completion; restored on
    /// reopen.
    #[serde(default)]
    pub archived_subtask_states: Option<Vec<SubtaskState>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            completed: false,
            completed_at: None,
            due_date: None,
            priority: TaskPriority::Medium,
            time_spent_secs: 0.0,
            color: "#6C5CE7".into(),
            archived: false,
            parent_id: None,
            archived_subtask_states: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn add_time_spent(&mut self, secs: f64) {
        if secs.is_finite() && secs > 0.0 {
            self.time_spent_secs += secs;
            self.updated_at = Utc::now();
        }
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.completed = true;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_incomplete(&mut self) {
        self.completed = false;
        self.completed_at = None;
        self.updated_at = Utc::now();
    }

    /// Complete this task together with all of its `subtasks`, keeping their
    /// previous states for [`Task::reopen_with_subtasks`]. No-op when already
    /// completed.
    pub fn complete_with_subtasks(&mut self, subtasks: &mut [Task]) {
        if self.completed {
            return;
        }
        if !subtasks.is_empty() {
            self.archived_subtask_states = Some(
                subtasks
                    .iter()
                    .map(|t| SubtaskState {
                        id: t.id.clone(),
                        completed: t.completed,
                    })
                    .collect(),
            );
        }
        for sub in subtasks.iter_mut().filter(|t| !t.completed) {
            sub.mark_completed();
        }
        self.mark_completed();
    }

    /// Reopen this task and put its subtasks back the way they were before
    /// it was completed. Subtasks added since keep their current state.
    pub fn reopen_with_subtasks(&mut self, subtasks: &mut [Task]) {
        if let Some(states) = self.archived_subtask_states.take() {
            for sub in subtasks.iter_mut() {
                match states.iter().find(|s| s.id == sub.id) {
                    Some(state) if !state.completed && sub.completed => sub.mark_incomplete(),
                    Some(state) if state.completed && !sub.completed => sub.mark_completed(),
                    _ => {}
                }
            }
        }
        self.mark_incomplete();
    }

    pub fn formatted_time_spent(&self) -> String {
        format_duration_short(self.time_spent_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty("title"));
        }
        Ok(())
    }
}

/// Share of completed subtasks; a task without subtasks is 0 or 1.
pub fn subtask_progress(task: &Task, subtasks: &[Task]) -> f64 {
    if subtasks.is_empty() {
        return if task.completed { 1.0 } else { 0.0 };
    }
    let done = subtasks.iter().filter(|t| t.completed).count();
    done as f64 / subtasks.len() as f64
}
