//! Habit and habit log persistence.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

use super::database::{format_datetime, parse_datetime_fallback, Database};
use crate::error::{CoreError, Result};
use crate::habit::{Frequency, Habit, HabitLog, HabitType, HabitUnit};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_habit_type(s: &str) -> HabitType {
    match s {
        "negative" => HabitType::Negative,
        _ => HabitType::Positive,
    }
}

fn format_habit_type(habit_type: HabitType) -> &'static str {
    match habit_type {
        HabitType::Positive => "positive",
        HabitType::Negative => "negative",
    }
}

fn parse_frequency(s: &str) -> Frequency {
    match s {
        "weekly" => Frequency::Weekly,
        "monthly" => Frequency::Monthly,
        _ => Frequency::Daily,
    }
}

fn format_frequency(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Daily => "daily",
        Frequency::Weekly => "weekly",
        Frequency::Monthly => "monthly",
    }
}

const HABIT_COLUMNS: &str = "id, title, icon, color, habit_type, goal_amount, unit, frequency,
     specific_days, sort_order, archived, created_at, updated_at";

fn row_to_habit(row: &rusqlite::Row) -> std::result::Result<Habit, rusqlite::Error> {
    let habit_type: String = row.get(4)?;
    let unit: String = row.get(6)?;
    let frequency: String = row.get(7)?;
    let specific_days: String = row.get(8)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(Habit {
        id: row.get(0)?,
        title: row.get(1)?,
        icon: row.get(2)?,
        color: row.get(3)?,
        habit_type: parse_habit_type(&habit_type),
        goal_amount: row.get(5)?,
        unit: unit.parse().unwrap_or(HabitUnit::Custom),
        frequency: parse_frequency(&frequency),
        specific_days: serde_json::from_str(&specific_days).unwrap_or_else(|_| (0..7).collect()),
        sort_order: row.get(9)?,
        archived: row.get(10)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

const LOG_COLUMNS: &str = "id, habit_id, date, value_logged, duration_logged_secs, note,
     created_at, updated_at";

fn row_to_habit_log(row: &rusqlite::Row) -> std::result::Result<HabitLog, rusqlite::Error> {
    let date: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(HabitLog {
        id: row.get(0)?,
        habit_id: row.get(1)?,
        date,
        value_logged: row.get(3)?,
        duration_logged_secs: row.get(4)?,
        note: row.get(5)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

fn habit_not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        kind: "habit",
        id: id.to_string(),
    }
}

impl Database {
    /// Insert a habit or update it in place, keeping its logs.
    pub fn upsert_habit(&self, habit: &Habit) -> Result<()> {
        habit.validate()?;
        self.conn.execute(
            "INSERT INTO habits
                (id, title, icon, color, habit_type, goal_amount, unit, frequency,
                 specific_days, sort_order, archived, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                icon = excluded.icon,
                color = excluded.color,
                habit_type = excluded.habit_type,
                goal_amount = excluded.goal_amount,
                unit = excluded.unit,
                frequency = excluded.frequency,
                specific_days = excluded.specific_days,
                sort_order = excluded.sort_order,
                archived = excluded.archived,
                updated_at = excluded.updated_at",
            params![
                habit.id,
                habit.title,
                habit.icon,
                habit.color,
                format_habit_type(habit.habit_type),
                habit.goal_amount,
                habit.unit.as_str(),
                format_frequency(habit.frequency),
                serde_json::to_string(&habit.specific_days)?,
                habit.sort_order,
                habit.archived,
                format_datetime(&habit.created_at),
                format_datetime(&habit.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_habit(&self, id: &str) -> Result<Option<Habit>> {
        let habit = self
            .conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
                params![id],
                row_to_habit,
            )
            .optional()?;
        Ok(habit)
    }

    /// Habits in display order; archived ones only when asked.
    pub fn list_habits(&self, include_archived: bool) -> Result<Vec<Habit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits
             WHERE archived = 0 OR ?1
             ORDER BY sort_order, created_at"
        ))?;
        let habits = stmt
            .query_map(params![include_archived], row_to_habit)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(habits)
    }

    /// Delete a habit together with its logs.
    pub fn delete_habit(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM habit_logs WHERE habit_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM habits WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(habit_not_found(id));
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_habit_log(&self, habit_id: &str, date: NaiveDate) -> Result<Option<HabitLog>> {
        let log = self
            .conn
            .query_row(
                &format!("SELECT {LOG_COLUMNS} FROM habit_logs WHERE habit_id = ?1 AND date = ?2"),
                params![habit_id, format_date(date)],
                row_to_habit_log,
            )
            .optional()?;
        Ok(log)
    }

    /// Logs of a habit in `[from, to]`, oldest first.
    pub fn habit_logs_between(
        &self,
        habit_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HabitLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs
             WHERE habit_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date"
        ))?;
        let logs = stmt
            .query_map(
                params![habit_id, format_date(from), format_date(to)],
                row_to_habit_log,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    pub fn habit_logs(&self, habit_id: &str) -> Result<Vec<HabitLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs WHERE habit_id = ?1 ORDER BY date"
        ))?;
        let logs = stmt
            .query_map(params![habit_id], row_to_habit_log)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    fn save_habit_log(&self, log: &HabitLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO habit_logs
                (id, habit_id, date, value_logged, duration_logged_secs, note,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (habit_id, date) DO UPDATE SET
                value_logged = excluded.value_logged,
                duration_logged_secs = excluded.duration_logged_secs,
                note = excluded.note,
                updated_at = excluded.updated_at",
            params![
                log.id,
                log.habit_id,
                format_date(log.date),
                log.value_logged,
                log.duration_logged_secs,
                log.note,
                format_datetime(&log.created_at),
                format_datetime(&log.updated_at),
            ],
        )?;
        Ok(())
    }

    fn update_habit_log(
        &self,
        habit_id: &str,
        date: NaiveDate,
        apply: impl FnOnce(&mut HabitLog),
    ) -> Result<HabitLog> {
        if self.get_habit(habit_id)?.is_none() {
            return Err(habit_not_found(habit_id));
        }
        let mut log = self
            .get_habit_log(habit_id, date)?
            .unwrap_or_else(|| HabitLog::new(habit_id, date));
        apply(&mut log);
        log.updated_at = Utc::now();
        self.save_habit_log(&log)?;
        Ok(log)
    }

    /// Add `amount` to the count logged for `date`.
    pub fn log_habit_value(
        &self,
        habit_id: &str,
        date: NaiveDate,
        amount: f64,
    ) -> Result<HabitLog> {
        self.update_habit_log(habit_id, date, |log| log.increment_value(amount))
    }

    /// Add timed seconds to the log for `date`.
    pub fn log_habit_duration(
        &self,
        habit_id: &str,
        date: NaiveDate,
        secs: f64,
    ) -> Result<HabitLog> {
        self.update_habit_log(habit_id, date, |log| log.increment_duration(secs))
    }

    pub fn set_habit_note(&self, habit_id: &str, date: NaiveDate, note: &str) -> Result<HabitLog> {
        let note = (!note.is_empty()).then(|| note.to_string());
        self.update_habit_log(habit_id, date, |log| log.note = note)
    }
}
