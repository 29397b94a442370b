//! Foreground timer sessions.
//!
//! The session runs until it completes, the user types `s`/`q`, or Ctrl-C.
//! Stdin commands: `p` toggles pause, `+` adds a minute.

use std::io::Write;
use std::sync::mpsc::Receiver;

use chrono::Utc;
use clap::Subcommand;
use focushabits_core::recorder::{record_completion, record_stop, StopOutcome};
use focushabits_core::storage::{Config, Database};
use focushabits_core::timer::{
    format_clock, format_duration_short, SystemClock, TimerCoordinator, TokioTicker,
};
use focushabits_core::{Event, StatusFileSink, TimerPhase};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{print_json, today};

#[derive(Subcommand)]
pub enum TimerAction {
    #[command(flatten)]
    Run(SessionTarget),
    /// Print the live status of the session running in another shell
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionTarget {
    /// Run a Pomodoro countdown
    Pomodoro {
        /// Length in minutes (default from config)
        #[arg(long)]
        minutes: Option<f64>,
        /// Session label
        #[arg(long)]
        title: Option<String>,
        /// Print events as JSON lines instead of a progress line
        #[arg(long)]
        json: bool,
    },
    /// Time a habit; the time is added to today's log
    Habit {
        /// Habit ID
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Time a task; the time is added to its time spent
    Task {
        /// Task ID
        id: String,
        #[arg(long)]
        json: bool,
    },
}

impl SessionTarget {
    fn json(&self) -> bool {
        match self {
            SessionTarget::Pomodoro { json, .. }
            | SessionTarget::Habit { json, .. }
            | SessionTarget::Task { json, .. } => *json,
        }
    }
}

/// Why the session loop ended.
enum Finish {
    Completed(Event),
    Stopped,
}

enum Key {
    Toggle,
    AddMinute,
    Stop,
}

fn parse_key(input: &str) -> Option<Key> {
    match input {
        "p" | "P" => Some(Key::Toggle),
        "+" => Some(Key::AddMinute),
        "s" | "S" | "q" | "Q" => Some(Key::Stop),
        _ => None,
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Status { json } => status(json),
        TimerAction::Run(target) => {
            let config = Config::load_or_default();
            let db = Database::open()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_session(target, &config, db))
        }
    }
}

fn status(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let sink = StatusFileSink::new(config.status_file_path()?);
    match sink.read()? {
        Some(snapshot) if json => print_json(&snapshot)?,
        Some(snapshot) => {
            let state = if snapshot.is_running { "running" } else { "paused" };
            println!(
                "{}: {} {} ({state})",
                snapshot.kind_label,
                snapshot.title,
                snapshot.formatted_time()
            );
        }
        None if json => println!("null"),
        None => println!("idle"),
    }
    Ok(())
}

async fn run_session(
    target: SessionTarget,
    config: &Config,
    mut db: Database,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = target.json();
    let (ticker, mut ticks) = TokioTicker::new();
    let mut timer = TimerCoordinator::new(SystemClock, ticker)
        .with_config(config.coordinator_config())
        .with_broadcaster(config.live_status_broadcaster()?);
    let (_, events) = timer.subscribe_channel();

    match target {
        SessionTarget::Pomodoro { minutes, title, .. } => {
            let secs = minutes
                .map(|m| m * 60.0)
                .unwrap_or_else(|| config.default_pomodoro_secs());
            let title = title.unwrap_or_else(|| config.pomodoro.default_title.clone());
            timer.start_pomodoro(secs, title);
        }
        SessionTarget::Habit { id, .. } => {
            let habit = db
                .get_habit(&id)?
                .ok_or_else(|| format!("habit not found: {id}"))?;
            if !habit.is_time_based() {
                return Err(format!(
                    "habit {} counts {} and cannot be timed; use `habit log --amount`",
                    habit.title, habit.unit
                )
                .into());
            }
            timer.start_habit_timer(
                &habit.id,
                &habit.title,
                &habit.color,
                Some(habit.timer_target_secs()),
            );
        }
        SessionTarget::Task { id, .. } => {
            let task = db
                .get_task(&id)?
                .ok_or_else(|| format!("task not found: {id}"))?;
            timer.start_task_timer(&task.id, &task.title, &task.color);
        }
    }
    report_events(&events, json)?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut progress = ProgressLine::default();
    if !json {
        progress.render(&timer);
    }

    let finish = loop {
        tokio::select! {
            Some(handle) = ticks.recv() => {
                if let Some(event) = timer.on_tick(handle) {
                    break Finish::Completed(event);
                }
                report_events(&events, json)?;
                if !json {
                    progress.render(&timer);
                }
            }
            line = input.next_line(), if stdin_open => {
                let Ok(Some(line)) = line else {
                    stdin_open = false;
                    continue;
                };
                match parse_key(line.trim()) {
                    Some(Key::Toggle) => {
                        if let Some(event @ Event::CountdownCompleted { .. }) =
                            timer.toggle_play_pause()
                        {
                            break Finish::Completed(event);
                        }
                    }
                    Some(Key::AddMinute) => {
                        if timer.add_one_minute() <= 0.0 && !json {
                            progress.note("already at the maximum length");
                        }
                    }
                    Some(Key::Stop) => break Finish::Stopped,
                    None => {}
                }
                report_events(&events, json)?;
                if !json {
                    progress.render(&timer);
                }
            }
            _ = tokio::signal::ctrl_c() => break Finish::Stopped,
        }
    };
    progress.clear();

    match finish {
        Finish::Completed(event) => {
            report_events(&events, json)?;
            let record = record_completion(&mut db, &event)?;
            if !json {
                if let Some(record) = record {
                    println!(
                        "Completed {} ({})",
                        record.label.as_deref().unwrap_or("Pomodoro"),
                        format_duration_short(record.actual_duration_secs)
                    );
                }
            }
        }
        Finish::Stopped => {
            let state = timer.state().clone();
            let elapsed = timer.stop_timer();
            report_events(&events, json)?;
            let outcome = record_stop(
                &mut db,
                &state,
                elapsed,
                Utc::now(),
                today(),
                config.min_recorded_interruption_secs(),
            )?;
            match outcome {
                Some(outcome) if json => {
                    println!("{}", serde_json::to_string(&outcome_json(&outcome, elapsed))?)
                }
                Some(outcome) => println!("{}", describe_outcome(&outcome, &state.title)),
                None => {}
            }
        }
    }
    Ok(())
}

/// Flush the events published since the last call, one JSON object per line
/// in `--json` mode.
fn report_events(events: &Receiver<Event>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    for event in events.try_iter() {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            tracing::debug!(event = event.name(), "timer event");
        }
    }
    Ok(())
}

fn describe_outcome(outcome: &StopOutcome, title: &str) -> String {
    match outcome {
        StopOutcome::Interrupted(record) => format!(
            "Stopped {title} after {}; recorded as interrupted",
            format_duration_short(record.actual_duration_secs)
        ),
        StopOutcome::Discarded { elapsed_secs } => format!(
            "Stopped {title} after {}; too short to record",
            format_clock(*elapsed_secs)
        ),
        StopOutcome::TaskTime { secs, .. } => {
            format!("Added {} to task {title}", format_clock(*secs))
        }
        StopOutcome::HabitTime { secs, date, .. } => {
            format!("Added {} to habit {title} for {date}", format_clock(*secs))
        }
    }
}

fn outcome_json(outcome: &StopOutcome, elapsed_secs: f64) -> serde_json::Value {
    match outcome {
        StopOutcome::Interrupted(record) => serde_json::json!({
            "outcome": "interrupted",
            "elapsed_secs": elapsed_secs,
            "session": record,
        }),
        StopOutcome::Discarded { .. } => serde_json::json!({
            "outcome": "discarded",
            "elapsed_secs": elapsed_secs,
        }),
        StopOutcome::TaskTime { task_id, secs } => serde_json::json!({
            "outcome": "task_time",
            "task_id": task_id,
            "elapsed_secs": secs,
        }),
        StopOutcome::HabitTime {
            habit_id,
            date,
            secs,
        } => serde_json::json!({
            "outcome": "habit_time",
            "habit_id": habit_id,
            "date": date,
            "elapsed_secs": secs,
        }),
    }
}

/// Single-line progress display redrawn in place.
#[derive(Default)]
struct ProgressLine {
    last: String,
    width: usize,
}

impl ProgressLine {
    fn render(&mut self, timer: &TimerCoordinator) {
        let time = if timer.is_countdown_mode() {
            timer.formatted_remaining()
        } else {
            timer.formatted_elapsed()
        };
        let paused = if timer.phase() == TimerPhase::Paused {
            "  [paused]"
        } else {
            ""
        };
        let line = format!(
            "{}  {}  {time}{paused}",
            timer.title(),
            progress_bar(timer.progress())
        );
        if line != self.last {
            self.draw(&line);
            self.last = line;
        }
    }

    fn note(&mut self, message: &str) {
        self.clear();
        println!("{message}");
    }

    fn draw(&mut self, line: &str) {
        let pad = self.width.saturating_sub(line.chars().count());
        let mut out = std::io::stdout();
        let _ = write!(out, "\r{line}{}", " ".repeat(pad));
        let _ = out.flush();
        self.width = line.chars().count();
    }

    fn clear(&mut self) {
        if self.width > 0 {
            let mut out = std::io::stdout();
            let _ = write!(out, "\r{}\r", " ".repeat(self.width));
            let _ = out.flush();
            self.width = 0;
            self.last.clear();
        }
    }
}

fn progress_bar(progress: f64) -> String {
    const WIDTH: usize = 20;
    let filled = ((progress.clamp(0.0, 1.0) * WIDTH as f64).round() as usize).min(WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert!(matches!(parse_key("p"), Some(Key::Toggle)));
        assert!(matches!(parse_key("+"), Some(Key::AddMinute)));
        assert!(matches!(parse_key("q"), Some(Key::Stop)));
        assert!(parse_key("x").is_none());
    }

    #[test]
    fn bar_is_fixed_width() {
        assert_eq!(progress_bar(0.0), format!("[{}]", "-".repeat(20)));
        assert_eq!(
            progress_bar(0.5),
            format!("[{}{}]", "#".repeat(10), "-".repeat(10))
        );
        assert_eq!(progress_bar(2.0), format!("[{}]", "#".repeat(20)));
    }
}
