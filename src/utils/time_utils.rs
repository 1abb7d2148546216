use chrono::{DateTime, Utc};

pub const MS_IN_S: i64 = 1000;
pub const MS_IN_MIN: i64 = MS_IN_S * 60;
pub const MS_IN_H: i64 = MS_IN_MIN * 60;
pub const MS_IN_D: i64 = MS_IN_H * 24;

const TIME_FORMAT: &str = "%H:%M:%S";

pub fn now_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `HH:MM:SS` (UTC) of an epoch-ms timestamp, for trade tables.
pub fn epoch_ms_to_time_string(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

pub fn format_duration(ms: i64) -> String {
    let secs = ms / MS_IN_S;
    if secs < 60 {
        return format!("{}s", secs);
    }
    let mins = ms / MS_IN_MIN;
    if mins < 60 {
        return format!("{}m {}s", mins, secs % 60);
    }
    let hours = ms / MS_IN_H;
    if hours < 24 {
        return format!("{}h {}m", hours, mins % 60);
    }
    format!("{}d {}h", ms / MS_IN_D, hours % 24)
}
