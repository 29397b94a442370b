//! Task persistence.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::database::{format_datetime, parse_datetime_fallback, Database};
use crate::error::{CoreError, Result};
use crate::task::{Task, TaskPriority};

const TASK_COLUMNS: &str = "id, title, description, completed, completed_at, due_date, priority,
     time_spent_secs, color, archived, parent_id, created_at, updated_at,
     archived_subtask_states";

fn row_to_task(row: &rusqlite::Row) -> std::result::Result<Task, rusqlite::Error> {
    let completed_at: Option<String> = row.get(4)?;
    let due_date: Option<String> = row.get(5)?;
    let priority: String = row.get(6)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    let archived_states: Option<String> = row.get(13)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
        completed_at: completed_at.as_deref().map(parse_datetime_fallback),
        due_date: due_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        priority: priority.parse().unwrap_or(TaskPriority::Medium),
        time_spent_secs: row.get(7)?,
        color: row.get(8)?,
        archived: row.get(9)?,
        parent_id: row.get(10)?,
        archived_subtask_states: archived_states
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok()),
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

fn task_not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        kind: "task",
        id: id.to_string(),
    }
}

impl Database {
    /// Insert a task or update it in place, keeping its subtasks.
    pub fn upsert_task(&self, task: &Task) -> Result<()> {
        task.validate()?;
        let archived_states = task
            .archived_subtask_states
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        if let Some(parent_id) = &task.parent_id {
            if self.get_task(parent_id)?.is_none() {
                return Err(task_not_found(parent_id));
            }
        }
        self.conn.execute(
            "INSERT INTO tasks
                (id, title, description, completed, completed_at, due_date, priority,
                 time_spent_secs, color, archived, parent_id, created_at, updated_at,
                 archived_subtask_states)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                completed = excluded.completed,
                completed_at = excluded.completed_at,
                due_date = excluded.due_date,
                priority = excluded.priority,
                time_spent_secs = excluded.time_spent_secs,
                color = excluded.color,
                archived = excluded.archived,
                parent_id = excluded.parent_id,
                updated_at = excluded.updated_at,
                archived_subtask_states = excluded.archived_subtask_states",
            params![
                task.id,
                task.title,
                task.description,
                task.completed,
                task.completed_at.as_ref().map(format_datetime),
                task.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
                task.priority.as_str(),
                task.time_spent_secs,
                task.color,
                task.archived,
                task.parent_id,
                format_datetime(&task.created_at),
                format_datetime(&task.updated_at),
                archived_states,
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Top-level tasks, open ones first, then by creation time.
    pub fn list_tasks(&self, include_completed: bool) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE parent_id IS NULL AND archived = 0 AND (completed = 0 OR ?1)
             ORDER BY completed, created_at"
        ))?;
        let tasks = stmt
            .query_map(params![include_completed], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn list_subtasks(&self, parent_id: &str) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE parent_id = ?1 ORDER BY created_at"
        ))?;
        let tasks = stmt
            .query_map(params![parent_id], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Add timer seconds to a task. Non-positive amounts are ignored.
    pub fn add_task_time(&self, id: &str, secs: f64) -> Result<()> {
        let mut task = self.get_task(id)?.ok_or_else(|| task_not_found(id))?;
        task.add_time_spent(secs);
        self.upsert_task(&task)
    }

    /// Complete or reopen a task. Completing cascades to its subtasks;
    /// reopening restores the subtask states saved by the completion.
    pub fn set_task_completed(&self, id: &str, completed: bool) -> Result<Task> {
        let mut task = self.get_task(id)?.ok_or_else(|| task_not_found(id))?;
        let mut subtasks = self.list_subtasks(id)?;
        if completed {
            task.complete_with_subtasks(&mut subtasks);
        } else {
            task.reopen_with_subtasks(&mut subtasks);
        }

        let tx = self.conn.unchecked_transaction()?;
        self.upsert_task(&task)?;
        for sub in &subtasks {
            self.upsert_task(sub)?;
        }
        tx.commit()?;
        tracing::debug!(task_id = id, completed, subtasks = subtasks.len(), "task completion set");
        Ok(task)
    }

    /// Delete a task; its subtasks go with it.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(task_not_found(id));
        }
        tracing::debug!(task_id = id, "task deleted");
        Ok(())
    }
}
