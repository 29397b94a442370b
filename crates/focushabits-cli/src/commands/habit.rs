//! Habit management commands for CLI.

use clap::{Subcommand, ValueEnum};
use focushabits_core::habit::{
    completion_ratio, month_dates, period_stats, week_dates, year_dates, Habit, HabitUnit,
};
use focushabits_core::timer::format_clock;
use focushabits_core::{CoreError, Database};

use super::{parse_date, print_json, today};

#[derive(Clone, Copy, ValueEnum)]
pub enum Period {
    Week,
    Month,
    Year,
}

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a new habit
    Add {
        /// Habit title
        title: String,
        /// Daily goal amount (default: 1)
        #[arg(long, default_value = "1")]
        goal: f64,
        /// Goal unit: times, minutes, hours, glasses, pages, steps, kilometers, calories, custom
        #[arg(long, default_value = "times")]
        unit: HabitUnit,
        /// Display color (hex)
        #[arg(long)]
        color: Option<String>,
        /// Comma-separated weekdays, 0 = Sunday (default: every day)
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<u8>>,
    },
    /// List habits due today with today's progress
    List {
        /// Include archived habits
        #[arg(long)]
        all: bool,
        /// Include habits not scheduled for today
        #[arg(long)]
        all_days: bool,
        #[arg(long)]
        json: bool,
    },
    /// Log progress for a day
    Log {
        /// Habit ID
        id: String,
        /// Amount for count-based habits (default: 1)
        #[arg(long, conflicts_with = "minutes")]
        amount: Option<f64>,
        /// Minutes for time-based habits
        #[arg(long)]
        minutes: Option<f64>,
        /// Day to log (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Attach a note to the day's log
        #[arg(long)]
        note: Option<String>,
    },
    /// Show completion stats over a period
    Stats {
        /// Habit ID
        id: String,
        #[arg(long, value_enum, default_value = "week")]
        period: Period,
        #[arg(long)]
        json: bool,
    },
    /// Archive a habit, keeping its logs
    Archive {
        /// Habit ID
        id: String,
    },
    /// Delete a habit and all its logs
    Delete {
        /// Habit ID
        id: String,
    },
}

pub fn run(action: HabitAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HabitAction::Add {
            title,
            goal,
            unit,
            color,
            days,
        } => {
            let mut habit = Habit::new(title).with_goal(goal, unit);
            if let Some(color) = color {
                habit = habit.with_color(color);
            }
            if let Some(days) = days {
                habit = habit.with_days(days);
            }
            db.upsert_habit(&habit)?;
            println!("Habit created: {}", habit.id);
        }
        HabitAction::List {
            all,
            all_days,
            json,
        } => {
            let day = today();
            let habits: Vec<Habit> = db
                .list_habits(all)?
                .into_iter()
                .filter(|h| all_days || h.is_scheduled_on(day))
                .collect();
            if json {
                print_json(&habits)?;
                return Ok(());
            }
            for habit in habits {
                let log = db.get_habit_log(&habit.id, day)?;
                let ratio = completion_ratio(&habit, log.as_ref());
                println!(
                    "{}  {:<24} {:>3.0}%  goal {} {}",
                    habit.id,
                    habit.title,
                    ratio * 100.0,
                    habit.goal_amount,
                    habit.unit
                );
            }
        }
        HabitAction::Log {
            id,
            amount,
            minutes,
            date,
            note,
        } => {
            let habit = get_habit(&db, &id)?;
            let date = parse_date(date.as_deref())?;
            let logged = match (habit.is_time_based(), amount, minutes) {
                (_, None, None) if note.is_some() => None,
                (true, None, Some(minutes)) => {
                    Some(db.log_habit_duration(&id, date, minutes * 60.0)?)
                }
                (true, _, _) => {
                    return Err(format!("{} is time-based; use --minutes", habit.title).into())
                }
                (false, _, Some(_)) => {
                    let message = format!("{} counts {}; use --amount", habit.title, habit.unit);
                    return Err(message.into());
                }
                (false, amount, None) => {
                    Some(db.log_habit_value(&id, date, amount.unwrap_or(1.0))?)
                }
            };
            let log = match note {
                Some(note) => db.set_habit_note(&id, date, &note)?,
                None => logged.ok_or("nothing to log")?,
            };
            if habit.is_time_based() {
                println!(
                    "{}: {} on {}",
                    habit.title,
                    format_clock(log.duration_logged_secs),
                    date
                );
            } else {
                println!(
                    "{}: {} {} on {}",
                    habit.title, log.value_logged, habit.unit, date
                );
            }
        }
        HabitAction::Stats { id, period, json } => {
            let habit = get_habit(&db, &id)?;
            let day = today();
            let days = match period {
                Period::Week => week_dates(day),
                Period::Month => month_dates(day),
                Period::Year => year_dates(day),
            };
            let logs = db.habit_logs(&id)?;
            let stats = period_stats(&habit, &logs, &days, day);
            if json {
                print_json(&stats)?;
            } else {
                println!("{}", habit.title);
                println!(
                    "  completed: {}/{} days ({:.0}%)",
                    stats.completed_days,
                    stats.days,
                    stats.completion_rate * 100.0
                );
                println!("  streak:    {} days", stats.streak);
                println!("  total:     {:.1} {}", stats.total_value, habit.unit);
                println!("  best day:  {:.1} {}", stats.best_value, habit.unit);
            }
        }
        HabitAction::Archive { id } => {
            let mut habit = get_habit(&db, &id)?;
            habit.archived = true;
            db.upsert_habit(&habit)?;
            println!("Habit archived: {id}");
        }
        HabitAction::Delete { id } => {
            db.delete_habit(&id)?;
            println!("Habit deleted: {id}");
        }
    }
    Ok(())
}

fn get_habit(db: &Database, id: &str) -> Result<Habit, CoreError> {
    db.get_habit(id)?.ok_or_else(|| CoreError::NotFound {
        kind: "habit",
        id: id.to_string(),
    })
}
