/// Format seconds as `H:MM:SS`, or `MM:SS` under an hour.
///
/// Fractions are truncated, negative input reads as zero.
pub fn format_clock(secs: f64) -> String {
    let total = whole_secs(secs);
    let hours = total / 3600;
    let minutes = total / 60 % 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Coarse duration such as `1h 5m` or `12m`, used for accumulated totals.
pub fn format_duration_short(secs: f64) -> String {
    let total = whole_secs(secs);
    let hours = total / 3600;
    let minutes = total / 60 % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn whole_secs(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        secs.trunc() as u64
    } else {
        0
    }
}
