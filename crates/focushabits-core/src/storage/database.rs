//! SQLite-backed storage.
//!
//! Provides persistent storage for:
//! - Recorded Pomodoro sessions and their statistics
//! - Habits and their daily logs (`habit_db.rs`)
//! - Tasks and subtasks (`task_db.rs`)

use std::path::Path;

use chrono::{DateTime, Duration, Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::recorder::{SessionRecord, SessionRecorder, SessionStatus};

/// Longest range `history` will report, about ten years.
pub const MAX_HISTORY_DAYS: u32 = 3660;

/// Totals over a set of recorded sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub interrupted_sessions: u64,
    pub focus_secs: f64,
}

/// Session totals of one local day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub stats: SessionStats,
}

/// SQLite database for sessions, habits and tasks.
pub struct Database {
    pub(super) conn: Connection,
}

/// Timestamps are stored as fixed-width RFC 3339 so they sort as text.
pub(super) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse datetime from RFC3339 string with fallback to current time
pub(super) fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_session_status(status_str: &str) -> SessionStatus {
    SessionStatus::parse(status_str).unwrap_or(SessionStatus::Interrupted)
}

/// UTC bounds of a local calendar day.
fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_of = |d: NaiveDate| {
        let midnight = d.and_hms_opt(0, 0, 0).unwrap_or_default();
        Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    };
    let next = date.succ_opt().unwrap_or(date);
    (start_of(date), start_of(next))
}

fn row_to_session(row: &rusqlite::Row) -> std::result::Result<SessionRecord, rusqlite::Error> {
    let started_at: String = row.get(1)?;
    let ended_at: Option<String> = row.get(2)?;
    let status: String = row.get(5)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        started_at: parse_datetime_fallback(&started_at),
        ended_at: ended_at.as_deref().map(parse_datetime_fallback),
        planned_duration_secs: row.get(3)?,
        actual_duration_secs: row.get(4)?,
        status: parse_session_status(&status),
        label: row.get(6)?,
        note: row.get(7)?,
    })
}

const SESSION_COLUMNS: &str = "id, started_at, ended_at, planned_duration_secs,
     actual_duration_secs, status, label, note";

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/focushabits.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("focushabits.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Store a session record, replacing any record with the same id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_session(&self, record: &SessionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pomodoro_sessions
                (id, started_at, ended_at, planned_duration_secs, actual_duration_secs,
                 status, label, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                format_datetime(&record.started_at),
                record.ended_at.as_ref().map(format_datetime),
                record.planned_duration_secs,
                record.actual_duration_secs,
                record.status.as_str(),
                record.label,
                record.note,
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM pomodoro_sessions
             ORDER BY started_at DESC LIMIT ?1"
        ))?;
        let sessions = stmt
            .query_map(params![limit as i64], row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Sessions started in `[from, to)`, oldest first.
    pub fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM pomodoro_sessions
             WHERE started_at >= ?1 AND started_at < ?2
             ORDER BY started_at"
        ))?;
        let sessions = stmt
            .query_map(
                params![format_datetime(&from), format_datetime(&to)],
                row_to_session,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    pub fn stats_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<SessionStats> {
        self.collect_stats(
            "WHERE started_at >= ?1 AND started_at < ?2",
            &[&format_datetime(&from), &format_datetime(&to)],
        )
    }

    fn collect_stats(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<SessionStats> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT status, COUNT(*), COALESCE(SUM(actual_duration_secs), 0)
             FROM pomodoro_sessions
             {filter}
             GROUP BY status"
        ))?;

        let mut stats = SessionStats::default();
        let rows = stmt.query_map(args, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        for row in rows {
            let (status, count, secs) = row?;
            stats.total_sessions += count;
            stats.focus_secs += secs;
            match parse_session_status(&status) {
                SessionStatus::Completed => stats.completed_sessions += count,
                SessionStatus::Interrupted => stats.interrupted_sessions += count,
                SessionStatus::Running | SessionStatus::Paused => {}
            }
        }
        Ok(stats)
    }

    /// Totals of the local calendar day `date`.
    pub fn day_stats(&self, date: NaiveDate) -> Result<DayStats> {
        let (from, to) = local_day_bounds(date);
        Ok(DayStats {
            date,
            stats: self.stats_between(from, to)?,
        })
    }

    /// One entry per day for the `days` days ending at `today`, oldest first.
    /// At most [`MAX_HISTORY_DAYS`] days.
    pub fn history(&self, today: NaiveDate, days: u32) -> Result<Vec<DayStats>> {
        if days > MAX_HISTORY_DAYS {
            return Err(ValidationError::InvalidValue {
                field: "days".into(),
                message: format!("at most {MAX_HISTORY_DAYS} days of history"),
            }
            .into());
        }
        (0..i64::from(days))
            .rev()
            .map(|back| {
                let date = today
                    .checked_sub_signed(Duration::days(back))
                    .ok_or_else(|| ValidationError::InvalidValue {
                        field: "days".into(),
                        message: format!("{back} days before {today} is out of range"),
                    })?;
                self.day_stats(date)
            })
            .collect()
    }

    pub fn stats_all(&self) -> Result<SessionStats> {
        self.collect_stats("", &[])
    }
}

impl SessionRecorder for Database {
    fn record_session(&mut self, record: &SessionRecord) -> Result<()> {
        self.insert_session(record)?;
        tracing::info!(
            status = record.status.as_str(),
            actual_secs = record.actual_duration_secs,
            "session recorded"
        );
        Ok(())
    }

    fn add_task_time(&mut self, task_id: &str, secs: f64) -> Result<()> {
        Database::add_task_time(self, task_id, secs)
    }

    fn add_habit_time(&mut self, habit_id: &str, date: NaiveDate, secs: f64) -> Result<()> {
        self.log_habit_duration(habit_id, date, secs).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn record_at(started_at: DateTime<Utc>, secs: f64, status: SessionStatus) -> SessionRecord {
        SessionRecord::new(
            started_at,
            started_at + Duration::seconds(secs as i64),
            1500.0,
            secs,
            status,
        )
    }

    fn local_noon(date: NaiveDate) -> DateTime<Utc> {
        Local
            .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let record = record_at(now, 1500.0, SessionStatus::Completed).with_label("Deep work");
        db.insert_session(&record).unwrap();

        let sessions = db.list_sessions(10).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, record.id);
        assert_eq!(sessions[0].label.as_deref(), Some("Deep work"));
        assert_eq!(sessions[0].status, SessionStatus::Completed);

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.focus_secs, 1500.0);
    }

    #[test]
    fn day_stats_split_by_status() {
        let db = Database::open_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let noon = local_noon(today);
        db.insert_session(&record_at(noon, 1500.0, SessionStatus::Completed))
            .unwrap();
        db.insert_session(&record_at(noon + Duration::hours(1), 300.0, SessionStatus::Interrupted))
            .unwrap();
        db.insert_session(&record_at(
            local_noon(today.pred_opt().unwrap()),
            1500.0,
            SessionStatus::Completed,
        ))
        .unwrap();

        let day = db.day_stats(today).unwrap();
        assert_eq!(day.stats.total_sessions, 2);
        assert_eq!(day.stats.completed_sessions, 1);
        assert_eq!(day.stats.interrupted_sessions, 1);
        assert_eq!(day.stats.focus_secs, 1800.0);

        let history = db.history(today, 3).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].date, today);
        assert_eq!(history[1].stats.completed_sessions, 1);
        assert_eq!(history[0].stats.total_sessions, 0);
    }

    #[test]
    fn history_rejects_out_of_range_days() {
        let db = Database::open_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let err = db.history(today, 100_000_000).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{err}");
        assert!(db.history(today, u32::MAX).is_err());

        let earliest = NaiveDate::MIN.succ_opt().unwrap();
        assert!(db.history(earliest, 3).is_err());
        assert_eq!(db.history(today, MAX_HISTORY_DAYS).unwrap().len(), 3660);
    }

    #[test]
    fn recorder_impl_writes_sessions() {
        let mut db = Database::open_memory().unwrap();
        let record = record_at(Utc::now(), 120.0, SessionStatus::Interrupted);
        db.record_session(&record).unwrap();
        assert_eq!(db.stats_all().unwrap().interrupted_sessions, 1);
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focushabits.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.insert_session(&record_at(Utc::now(), 60.0, SessionStatus::Completed))
                .unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.list_sessions(5).unwrap().len(), 1);
    }
}
