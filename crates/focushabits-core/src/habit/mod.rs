//! Habit types and the reducers built on their daily logs.

mod dates;
mod stats;

pub use dates::{month_dates, week_dates, weekday_index, year_dates};
pub use stats::{completion_ratio, period_stats, streak, HabitStats};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Whether the habit is one to build or one to quit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HabitType {
    #[default]
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Unit a habit goal is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HabitUnit {
    #[default]
    Times,
    Minutes,
    Hours,
    Glasses,
    Pages,
    Steps,
    Kilometers,
    Calories,
    Custom,
}

impl HabitUnit {
    pub const ALL: [HabitUnit; 9] = [
        HabitUnit::Times,
        HabitUnit::Minutes,
        HabitUnit::Hours,
        HabitUnit::Glasses,
        HabitUnit::Pages,
        HabitUnit::Steps,
        HabitUnit::Kilometers,
        HabitUnit::Calories,
        HabitUnit::Custom,
    ];

    /// Time-based habits are logged in seconds and can be timed.
    pub fn is_time_based(&self) -> bool {
        matches!(self, HabitUnit::Minutes | HabitUnit::Hours)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HabitUnit::Times => "times",
            HabitUnit::Minutes => "minutes",
            HabitUnit::Hours => "hours",
            HabitUnit::Glasses => "glasses",
            HabitUnit::Pages => "pages",
            HabitUnit::Steps => "steps",
            HabitUnit::Kilometers => "kilometers",
            HabitUnit::Calories => "calories",
            HabitUnit::Custom => "custom",
        }
    }
}

impl fmt::Display for HabitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HabitUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        HabitUnit::ALL
            .into_iter()
            .find(|u| u.as_str() == lower)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "unit".into(),
                message: format!("unknown unit '{s}'"),
            })
    }
}

/// A habit definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub color: String,
    pub habit_type: HabitType,
    pub goal_amount: f64,
    pub unit: HabitUnit,
    pub frequency: Frequency,
    /// Weekdays the habit is due on, 0 = Sunday .. 6 = Saturday.
    pub specific_days: Vec<u8>,
    pub sort_order: i64,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            icon: "star".into(),
            color: "#FF6B6B".into(),
            habit_type: HabitType::Positive,
            goal_amount: 1.0,
            unit: HabitUnit::Times,
            frequency: Frequency::Daily,
            specific_days: (0..7).collect(),
            sort_order: 0,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_goal(mut self, goal_amount: f64, unit: HabitUnit) -> Self {
        self.goal_amount = goal_amount;
        self.unit = unit;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_days(mut self, days: Vec<u8>) -> Self {
        self.specific_days = days;
        self
    }

    pub fn is_time_based(&self) -> bool {
        self.unit.is_time_based()
    }

    /// Target handed to the habit timer: the goal read as minutes.
    pub fn timer_target_secs(&self) -> f64 {
        self.goal_amount * 60.0
    }

    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.specific_days.contains(&weekday_index(date))
    }

    /// Check the fields a caller can get wrong.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty("title"));
        }
        if !self.goal_amount.is_finite() || self.goal_amount <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "goal_amount".into(),
                message: format!("must be positive, got {}", self.goal_amount),
            });
        }
        if let Some(day) = self.specific_days.iter().find(|d| **d > 6) {
            return Err(ValidationError::InvalidValue {
                field: "specific_days".into(),
                message: format!("weekday {day} out of range 0-6"),
            });
        }
        Ok(())
    }
}

/// One day's progress on a habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitLog {
    pub id: String,
    pub habit_id: String,
    pub date: NaiveDate,
    /// Count for count-based habits.
    pub value_logged: f64,
    /// Seconds for time-based habits.
    pub duration_logged_secs: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HabitLog {
    pub fn new(habit_id: impl Into<String>, date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            habit_id: habit_id.into(),
            date,
            value_logged: 0.0,
            duration_logged_secs: 0.0,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn increment_value(&mut self, amount: f64) {
        self.value_logged += amount;
        self.updated_at = Utc::now();
    }

    pub fn increment_duration(&mut self, secs: f64) {
        self.duration_logged_secs += secs;
        self.updated_at = Utc::now();
    }
}
