use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone, Timelike, Utc};
use regex::Regex;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d{2}:\d{2}:\d{2})\]").expect("timestamp pattern"));

static LOG_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[^\]]*\]\s*\[[^\]]*\]:\s*").expect("log prefix pattern")
});

/// Reads the `[HH:MM:SS]` stamp a server prints and pins it to today's date.
pub fn extract_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let time_s = TIMESTAMP.captures(input).map(|v| v[1].to_string())?;
    let time = NaiveTime::parse_from_str(&time_s, "%H:%M:%S").ok()?;

    let today = Local::now().date_naive();

    let local_dt = Local
        .with_ymd_and_hms(
            today.year(),
            today.month(),
            today.day(),
            time.hour(),
            time.minute(),
            time.second(),
        )
        .single()?;

    Some(local_dt.with_timezone(&Utc))
}

pub fn strip_log_prefix(input: &str) -> &str {
    match LOG_PREFIX.find(input) {
        Some(m) => &input[m.end()..],
        None => input,
    }
}

/// Last `max` characters of `text`, cut on a char boundary.
pub fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
