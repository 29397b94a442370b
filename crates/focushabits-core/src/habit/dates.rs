use chrono::{Datelike, Duration, NaiveDate};

/// Weekday as 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// The Sunday-first week containing `date`.
pub fn week_dates(date: NaiveDate) -> Vec<NaiveDate> {
    let start = date - Duration::days(i64::from(weekday_index(date)));
    start.iter_days().take(7).collect()
}

pub fn month_dates(date: NaiveDate) -> Vec<NaiveDate> {
    let Some(first) = date.with_day(1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| d.month() == first.month())
        .collect()
}

pub fn year_dates(date: NaiveDate) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(date.year(), 1, 1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| d.year() == first.year())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_starts_on_sunday() {
        let week = week_dates(day(2026, 10, 16));
        assert_eq!(week.len(), 7);
        assert_eq!(week[0], day(2026, 10, 11));
        assert_eq!(week[6], day(2026, 10, 17));
        assert_eq!(weekday_index(week[0]), 0);
    }

    #[test]
    fn month_and_year_lengths() {
        assert_eq!(month_dates(day(2024, 2, 10)).len(), 29);
        assert_eq!(month_dates(day(2026, 10, 16)).len(), 31);
        assert_eq!(year_dates(day(2024, 6, 1)).len(), 366);
        assert_eq!(year_dates(day(2026, 6, 1)).len(), 365);
    }
}
