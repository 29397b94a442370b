use clap::Subcommand;
use focushabits_core::storage::{Database, SessionStats, MAX_HISTORY_DAYS};
use focushabits_core::timer::format_duration_short;

use super::{print_json, today};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's Pomodoro stats
    Today {
        #[arg(long)]
        json: bool,
    },
    /// Per-day stats for recent days
    History {
        /// Number of days, ending today
        #[arg(
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=MAX_HISTORY_DAYS as i64)
        )]
        days: u32,
        #[arg(long)]
        json: bool,
    },
    /// All-time stats
    All {
        #[arg(long)]
        json: bool,
    },
    /// Recently recorded sessions
    Sessions {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::Today { json } => {
            let day = db.day_stats(today())?;
            if json {
                print_json(&day)?;
            } else {
                println!("{}: {}", day.date, summary(&day.stats));
            }
        }
        StatsAction::History { days, json } => {
            let history = db.history(today(), days)?;
            if json {
                print_json(&history)?;
            } else {
                for day in history {
                    println!("{}: {}", day.date, summary(&day.stats));
                }
            }
        }
        StatsAction::All { json } => {
            let stats = db.stats_all()?;
            if json {
                print_json(&stats)?;
            } else {
                println!("{}", summary(&stats));
            }
        }
        StatsAction::Sessions { limit, json } => {
            let sessions = db.list_sessions(limit)?;
            if json {
                print_json(&sessions)?;
            } else {
                for s in sessions {
                    println!(
                        "{}  {:<11} {:>6}/{:<6} {}",
                        s.started_at.format("%Y-%m-%d %H:%M"),
                        s.status.as_str(),
                        format_duration_short(s.actual_duration_secs),
                        format_duration_short(s.planned_duration_secs),
                        s.label.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
    Ok(())
}

fn summary(stats: &SessionStats) -> String {
    format!(
        "{} sessions ({} completed, {} interrupted), {} focused",
        stats.total_sessions,
        stats.completed_sessions,
        stats.interrupted_sessions,
        format_duration_short(stats.focus_secs)
    )
}
