//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use chrono::{Datelike, Local};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    run_cli_with_input(home, args, "")
}

/// Same as [`run_cli`], feeding `input` to stdin.
fn run_cli_with_input(home: &Path, args: &[&str], input: &str) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_focushabits"))
        .args(args)
        .env("FOCUSHABITS_HOME", home)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");
    // The child may exit before reading; dropping stdin closes it.
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(input.as_bytes());
    }
    let output = child.wait_with_output().expect("CLI command did not finish");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
    stdout
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let stdout = run_cli_success(home, args);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("bad JSON from {args:?}: {e}\n{stdout}"))
}

/// Pull the ID out of a "... created: <id>" line.
fn created_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.split_once("created: ").map(|(_, id)| id.trim().to_string()))
        .expect("no created line")
}

#[test]
fn test_task_add_and_list() {
    let home = tempfile::tempdir().unwrap();
    let parent = created_id(&run_cli_success(
        home.path(),
        &["task", "add", "Write report", "--priority", "high"],
    ));
    run_cli_success(home.path(), &["task", "add", "Outline", "--parent", &parent]);

    let tasks = run_json(home.path(), &["task", "list", "--json"]);
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "Write report");
    assert_eq!(tasks[0]["priority"], "high");

    run_cli_success(home.path(), &["task", "done", &parent]);
    let open = run_json(home.path(), &["task", "list", "--json"]);
    assert!(open.as_array().unwrap().is_empty());
    let all = run_json(home.path(), &["task", "list", "--all", "--json"]);
    assert_eq!(all[0]["completed"], true);
}

#[test]
fn test_task_done_cascades_to_subtasks() {
    let home = tempfile::tempdir().unwrap();
    let parent = created_id(&run_cli_success(home.path(), &["task", "add", "Launch"]));
    run_cli_success(home.path(), &["task", "add", "Docs", "--parent", &parent]);

    run_cli_success(home.path(), &["task", "done", &parent]);
    let out = run_cli_success(home.path(), &["task", "list", "--all"]);
    assert!(out.contains("subtasks 100% done"), "{out}");
    assert!(!out.contains("[ ]"), "{out}");

    run_cli_success(home.path(), &["task", "undo", &parent]);
    let out = run_cli_success(home.path(), &["task", "list"]);
    assert!(out.contains("subtasks 0% done"), "{out}");
}

#[test]
fn test_task_missing_parent_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["task", "add", "Orphan", "--parent", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"), "{stderr}");
}

#[test]
fn test_habit_add_log_and_stats() {
    let home = tempfile::tempdir().unwrap();
    let id = created_id(&run_cli_success(
        home.path(),
        &["habit", "add", "Water", "--goal", "8", "--unit", "glasses"],
    ));

    run_cli_success(home.path(), &["habit", "log", &id, "--amount", "3"]);
    let out = run_cli_success(home.path(), &["habit", "log", &id, "--amount", "5"]);
    assert!(out.contains("8 glasses"), "{out}");

    let stats = run_json(home.path(), &["habit", "stats", &id, "--json"]);
    assert_eq!(stats["days"], 7);
    assert_eq!(stats["completed_days"], 1);
    assert_eq!(stats["streak"], 1);
}

#[test]
fn test_habit_log_rejects_wrong_unit() {
    let home = tempfile::tempdir().unwrap();
    let id = created_id(&run_cli_success(
        home.path(),
        &["habit", "add", "Read", "--goal", "20", "--unit", "minutes"],
    ));
    let (_, stderr, code) = run_cli(home.path(), &["habit", "log", &id, "--amount", "2"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--minutes"), "{stderr}");

    let out = run_cli_success(home.path(), &["habit", "log", &id, "--minutes", "5"]);
    assert!(out.contains("05:00"), "{out}");
}

#[test]
fn test_habit_list_shows_habits_due_today() {
    let home = tempfile::tempdir().unwrap();
    let tomorrow = (Local::now().date_naive().weekday().num_days_from_sunday() + 1) % 7;
    run_cli_success(home.path(), &["habit", "add", "Stretch"]);
    let days = tomorrow.to_string();
    run_cli_success(home.path(), &["habit", "add", "Gym", "--days", &days]);

    let due = run_json(home.path(), &["habit", "list", "--json"]);
    let due = due.as_array().unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0]["title"], "Stretch");

    let all = run_json(home.path(), &["habit", "list", "--all-days", "--json"]);
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let out = run_cli_success(home.path(), &["config", "get", "timer.default_pomodoro_min"]);
    assert_eq!(out.trim(), "30");

    run_cli_success(home.path(), &["config", "set", "timer.default_pomodoro_min", "25"]);
    let out = run_cli_success(home.path(), &["config", "get", "timer.default_pomodoro_min"]);
    assert_eq!(out.trim(), "25");

    let (_, _, code) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
}

#[test]
fn test_stats_today_empty() {
    let home = tempfile::tempdir().unwrap();
    let today = run_json(home.path(), &["stats", "today", "--json"]);
    assert_eq!(today["total_sessions"], 0);
    assert_eq!(today["focus_secs"], 0.0);
}

#[test]
fn test_short_pomodoro_is_recorded() {
    let home = tempfile::tempdir().unwrap();
    let out = run_cli_success(
        home.path(),
        &["timer", "pomodoro", "--minutes", "0.01", "--title", "Sprint", "--json"],
    );
    assert!(out.contains("\"CountdownCompleted\""), "{out}");

    let today = run_json(home.path(), &["stats", "today", "--json"]);
    assert_eq!(today["total_sessions"], 1);
    assert_eq!(today["completed_sessions"], 1);

    let sessions = run_json(home.path(), &["stats", "sessions", "--json"]);
    assert_eq!(sessions[0]["label"], "Sprint");
    assert_eq!(sessions[0]["status"], "completed");
}

#[test]
fn test_pomodoro_json_is_one_event_per_line() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli_with_input(
        home.path(),
        &["timer", "pomodoro", "--minutes", "10", "--json"],
        "+\ns\n",
    );
    assert_eq!(code, 0, "{stderr}");

    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON: {l}: {e}")))
        .collect();
    let types: Vec<&str> = lines.iter().filter_map(|v| v["type"].as_str()).collect();
    assert_eq!(types, ["TimerStarted", "TimeAdded", "TimerStopped"]);
    assert_eq!(lines[1]["added_secs"], 60.0);
    assert_eq!(lines.last().unwrap()["outcome"], "discarded");
}

#[test]
fn test_timer_rejects_count_habit() {
    let home = tempfile::tempdir().unwrap();
    let id = created_id(&run_cli_success(
        home.path(),
        &["habit", "add", "Water", "--goal", "8", "--unit", "glasses"],
    ));
    let (_, stderr, code) = run_cli_with_input(home.path(), &["timer", "habit", &id], "s\n");
    assert_eq!(code, 1);
    assert!(stderr.contains("cannot be timed"), "{stderr}");
}

#[test]
fn test_stats_history_days_is_bounded() {
    let home = tempfile::tempdir().unwrap();
    let history = run_json(home.path(), &["stats", "history", "--days", "3", "--json"]);
    assert_eq!(history.as_array().unwrap().len(), 3);

    let (_, stderr, code) = run_cli(home.path(), &["stats", "history", "--days", "100000000"]);
    assert_eq!(code, 2, "{stderr}");
}

#[test]
fn test_timer_unknown_habit_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["timer", "habit", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("habit not found"), "{stderr}");
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    let out = run_cli_success(home.path(), &["completions", "bash"]);
    assert!(out.contains("focushabits"));
}
