//! Database schema migrations for focushabits.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: habits, their daily logs, and tasks.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            icon          TEXT NOT NULL DEFAULT 'star',
            color         TEXT NOT NULL,
            habit_type    TEXT NOT NULL DEFAULT 'positive',
            goal_amount   REAL NOT NULL DEFAULT 1,
            unit          TEXT NOT NULL DEFAULT 'times',
            frequency     TEXT NOT NULL DEFAULT 'daily',
            specific_days TEXT NOT NULL DEFAULT '[0,1,2,3,4,5,6]',
            sort_order    INTEGER NOT NULL DEFAULT 0,
            archived      INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS habit_logs (
            id                    TEXT PRIMARY KEY,
            habit_id              TEXT NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
            date                  TEXT NOT NULL,
            value_logged          REAL NOT NULL DEFAULT 0,
            duration_logged_secs  REAL NOT NULL DEFAULT 0,
            note                  TEXT,
            created_at            TEXT NOT NULL,
            updated_at            TEXT NOT NULL,
            UNIQUE (habit_id, date)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            description     TEXT,
            completed       INTEGER NOT NULL DEFAULT 0,
            completed_at    TEXT,
            due_date        TEXT,
            priority        TEXT NOT NULL DEFAULT 'medium',
            time_spent_secs REAL NOT NULL DEFAULT 0,
            color           TEXT NOT NULL,
            archived        INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_habit_logs_habit_date ON habit_logs(habit_id, date);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: subtasks and recorded Pomodoro sessions.
///
/// Adds:
/// - tasks.parent_id
/// - pomodoro_sessions
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE tasks ADD COLUMN parent_id TEXT REFERENCES tasks(id) ON DELETE CASCADE;

        CREATE TABLE IF NOT EXISTS pomodoro_sessions (
            id                     TEXT PRIMARY KEY,
            started_at             TEXT NOT NULL,
            ended_at               TEXT,
            planned_duration_secs  REAL NOT NULL,
            actual_duration_secs   REAL NOT NULL,
            status                 TEXT NOT NULL,
            label                  TEXT,
            note                   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON pomodoro_sessions(started_at);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

/// Migration v3: subtask states saved when a parent task is completed.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("ALTER TABLE tasks ADD COLUMN archived_subtask_states TEXT;")?;
    set_schema_version(&tx, 3)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
        conn.query_row(
            &format!("SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = ?1"),
            [column],
            |row| row.get::<_, i32>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        assert!(has_column(&conn, "habits", "goal_amount"));
        assert!(has_column(&conn, "habit_logs", "duration_logged_secs"));
        assert!(has_column(&conn, "tasks", "parent_id"));
        assert!(has_column(&conn, "tasks", "archived_subtask_states"));
        assert!(has_column(&conn, "pomodoro_sessions", "status"));
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn incremental_migration_keeps_tasks() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO tasks (id, title, color, created_at, updated_at)
             VALUES ('t1', 'Old task', '#6C5CE7', '2024-01-01T12:00:00Z', '2024-01-01T12:00:00Z')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        let parent: Option<String> = conn
            .query_row("SELECT parent_id FROM tasks WHERE id = 't1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(parent.is_none());
    }
}
