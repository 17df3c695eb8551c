/// Render remaining time as `MM:SS`, or `H:MM:SS` from one hour up.
///
/// Negative input is clamped to zero.
pub fn format_remaining(secs: i64) -> String {
    let total = secs.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Short human form of a logged duration, e.g. `1h 30m` or `45m`.
pub fn format_time_spent(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
