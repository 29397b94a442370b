use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Habit, HabitLog};

/// Daily completion ratio in 0.0 ..= 1.0.
///
/// Count habits compare `value_logged` to the goal, time-based habits compare
/// logged seconds to `goal * 60`. Missing log or zero goal reads as 0.
pub fn completion_ratio(habit: &Habit, log: Option<&HabitLog>) -> f64 {
    let Some(log) = log else {
        return 0.0;
    };
    if habit.goal_amount <= 0.0 {
        return 0.0;
    }

    let ratio = if habit.is_time_based() {
        log.duration_logged_secs / (habit.goal_amount * 60.0)
    } else {
        log.value_logged / habit.goal_amount
    };
    ratio.clamp(0.0, 1.0)
}

/// Consecutive fully completed days walking back from `today`.
pub fn streak(habit: &Habit, logs: &[HabitLog], today: NaiveDate) -> u32 {
    let by_date: HashMap<NaiveDate, &HabitLog> = logs.iter().map(|l| (l.date, l)).collect();

    let mut count = 0;
    let mut date = today;
    while completion_ratio(habit, by_date.get(&date).copied()) >= 1.0 {
        count += 1;
        match date.pred_opt() {
            Some(prev) => date = prev,
            None => break,
        }
    }
    count
}

/// Summary of a habit over a period (a week, month or year of days).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HabitStats {
    pub days: usize,
    pub completed_days: usize,
    /// completed_days / days
    pub completion_rate: f64,
    pub streak: u32,
    /// Logged amount in goal units (minutes for time-based habits).
    pub total_value: f64,
    pub best_value: f64,
}

pub fn period_stats(
    habit: &Habit,
    logs: &[HabitLog],
    days: &[NaiveDate],
    today: NaiveDate,
) -> HabitStats {
    let by_date: HashMap<NaiveDate, &HabitLog> = logs.iter().map(|l| (l.date, l)).collect();

    let mut stats = HabitStats {
        days: days.len(),
        streak: streak(habit, logs, today),
        ..HabitStats::default()
    };

    for day in days {
        let Some(log) = by_date.get(day).copied() else {
            continue;
        };
        if completion_ratio(habit, Some(log)) >= 1.0 {
            stats.completed_days += 1;
        }
        let amount = if habit.is_time_based() {
            log.duration_logged_secs / 60.0
        } else {
            log.value_logged
        };
        stats.total_value += amount;
        stats.best_value = stats.best_value.max(amount);
    }

    if stats.days > 0 {
        stats.completion_rate = stats.completed_days as f64 / stats.days as f64;
    }
    stats
}
