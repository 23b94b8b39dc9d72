//! Human-readable times and sizes for command output.

use chrono::{DateTime, Local};

/// Formats a span of seconds as a coarse phrase ("5 minutes").
pub fn natural_delta(secs: u64) -> String {
    let (amount, unit) = if secs < 60 {
        (secs, "second")
    } else if secs < 3600 {
        (secs / 60, "minute")
    } else if secs < 86_400 {
        (secs / 3600, "hour")
    } else {
        (secs / 86_400, "day")
    };

    match amount {
        1 if unit == "hour" => "an hour".to_owned(),
        1 => format!("a {unit}"),
        n => format!("{n} {unit}s"),
    }
}

/// Describes `then` relative to `now` ("5 minutes ago").
pub fn natural_time(then: DateTime<Local>, now: DateTime<Local>) -> String {
    let delta = now.signed_duration_since(then).num_seconds();
    if delta == 0 {
        return "now".to_owned();
    }
    let phrase = natural_delta(delta.unsigned_abs());
    if delta > 0 {
        format!("{phrase} ago")
    } else {
        format!("{phrase} from now")
    }
}

/// Formats a byte count with decimal units ("12.3 MB").
#[allow(clippy::cast_precision_loss)]
pub fn natural_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["kB", "MB", "GB", "TB", "PB", "EB"];

    match bytes {
        1 => return "1 Byte".to_owned(),
        b if b < 1000 => return format!("{b} Bytes"),
        _ => {}
    }

    let mut value = bytes as f64 / 1000.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

/// Truncates a string to `max_len` characters, appending "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
