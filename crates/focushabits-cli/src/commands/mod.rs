pub mod config;
pub mod habit;
pub mod stats;
pub mod task;
pub mod timer;

use chrono::{Local, NaiveDate};

/// Today in the user's timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse `YYYY-MM-DD`, defaulting to today.
pub fn parse_date(date: Option<&str>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}").into()),
        None => Ok(today()),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
