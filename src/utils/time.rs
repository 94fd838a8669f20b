use std::time::Duration;

use chrono::NaiveDate;

/// This is the standard way of converting a date to a string in focuslog.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Formats whole seconds as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Formats a running stopwatch value as `HH:MM:SS.t`. Tenths are truncated, not rounded, so the
/// display never runs ahead of the measured time.
pub fn format_tick(elapsed: Duration) -> String {
    let tenths = elapsed.subsec_millis() / 100;
    format!("{}.{tenths}", format_hms(elapsed.as_secs()))
}

/// Short form used by the heatmaps, e.g. `3h 25m`.
pub fn format_hours_minutes(seconds: u64) -> String {
    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}
