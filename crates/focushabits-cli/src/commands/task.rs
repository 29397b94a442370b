//! Task management commands for CLI.

use clap::Subcommand;
use focushabits_core::task::subtask_progress;
use focushabits_core::{Database, Task, TaskPriority};

use super::{parse_date, print_json};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Priority: low, medium, high, urgent (default: medium)
        #[arg(long, default_value = "medium")]
        priority: TaskPriority,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Parent task ID, making this a subtask
        #[arg(long)]
        parent: Option<String>,
    },
    /// List top-level tasks with their subtasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Mark a task completed
    Done {
        /// Task ID
        id: String,
    },
    /// Mark a task not completed
    Undo {
        /// Task ID
        id: String,
    },
    /// Delete a task and its subtasks
    Delete {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Add {
            title,
            description,
            priority,
            due,
            parent,
        } => {
            let mut task = Task::new(title).with_priority(priority);
            task.description = description;
            if due.is_some() {
                task.due_date = Some(parse_date(due.as_deref())?);
            }
            if let Some(parent) = parent {
                task = task.with_parent(parent);
            }
            db.upsert_task(&task)?;
            println!("Task created: {}", task.id);
        }
        TaskAction::List { all, json } => {
            let tasks = db.list_tasks(all)?;
            if json {
                print_json(&tasks)?;
                return Ok(());
            }
            for task in tasks {
                let subtasks = db.list_subtasks(&task.id)?;
                print_task(&task, "");
                if !subtasks.is_empty() {
                    println!(
                        "    subtasks {:.0}% done",
                        subtask_progress(&task, &subtasks) * 100.0
                    );
                }
                for sub in subtasks.iter().filter(|t| all || !t.completed) {
                    print_task(sub, "    ");
                }
            }
        }
        TaskAction::Done { id } => {
            let task = db.set_task_completed(&id, true)?;
            println!("Task completed: {}", task.title);
        }
        TaskAction::Undo { id } => {
            let task = db.set_task_completed(&id, false)?;
            println!("Task reopened: {}", task.title);
        }
        TaskAction::Delete { id } => {
            db.delete_task(&id)?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}

fn print_task(task: &Task, indent: &str) {
    let mark = if task.completed { "x" } else { " " };
    let due = task
        .due_date
        .map(|d| format!("  due {d}"))
        .unwrap_or_default();
    println!(
        "{indent}[{mark}] {}  {}  ({}, {}){due}",
        task.id,
        task.title,
        task.priority,
        task.formatted_time_spent()
    );
}
