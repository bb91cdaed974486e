//! Display formatting for prices, volumes, durations and timestamps.

use super::levels::NearLevel;
use chrono::{DateTime, Utc};

/// Ages beyond this are shown as an absolute timestamp.
const RELATIVE_LIMIT_SECS: i64 = 8 * 3600;

/// `"12s ago"`, `"5m ago"`, `"2h 7m ago"`, or `"01-04 09:30"` past 8 hours.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds();
    match secs {
        _ if secs < 0 => "just now".to_string(),
        0..60 => format!("{secs}s ago"),
        60..3600 => format!("{}m ago", secs / 60),
        _ if secs < RELATIVE_LIMIT_SECS => {
            format!("{}h {}m ago", secs / 3600, (secs % 3600) / 60)
        }
        _ => at.format("%m-%d %H:%M").to_string(),
    }
}

/// Wall clock time of day.
pub fn clock_time(at: DateTime<Utc>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// Two decimals from 1000, four from 1, six significant digits below.
pub fn price(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= 1000.0 {
        format!("{value:.2}")
    } else if magnitude >= 1.0 {
        format!("{value:.4}")
    } else {
        significant(value, 6)
    }
}

fn significant(value: f64, digits: i32) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value:.prec$}", prec = (digits - 1) as usize);
    }
    let exponent = value.abs().log10().floor() as i32;
    let decimals = (digits - 1 - exponent).max(0) as usize;
    format!("{value:.decimals$}")
}

/// Signed percentage with two decimals, `+1.25%`.
pub fn percent(value: f64) -> String {
    if value >= 0.0 {
        format!("+{value:.2}%")
    } else {
        format!("{value:.2}%")
    }
}

/// Quote volume in dollars with K/M/B suffix.
pub fn volume(value: f64) -> String {
    if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.1}M", value / 1e6)
    } else if value >= 1e3 {
        format!("${:.0}K", value / 1e3)
    } else {
        format!("${value:.0}")
    }
}

pub fn trade_count(value: u64) -> String {
    let as_float = value as f64;
    if value >= 1_000_000 {
        format!("{:.1}M", as_float / 1e6)
    } else if value >= 1_000 {
        format!("{:.1}K", as_float / 1e3)
    } else {
        value.to_string()
    }
}

/// Countdown such as `"3h 12m"` or `"45m"`; negative is `"now"`.
pub fn duration_secs(secs: i64) -> String {
    if secs < 0 {
        return "now".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Level decoration, `D:R1(+1.2%)`.
pub fn level(level: &NearLevel) -> String {
    let sign = if level.distance_percent >= 0.0 { "+" } else { "" };
    format!(
        "{}:{}({}{:.1}%)",
        level.period.short_label(),
        level.name,
        sign,
        level.distance_percent
    )
}

/// Signed minute offset of a related pattern, `"5m before"` / `"3m after"`.
pub fn minutes_offset(minutes: i64) -> String {
    if minutes >= 0 {
        format!("{minutes}m before")
    } else {
        format!("{}m after", -minutes)
    }
}

/// Detector name of a pattern source.
pub fn pattern_source(source: &str) -> &str {
    match source {
        "talib" => "TA-Lib",
        "custom" => "Custom",
        "" => "unknown",
        other => other,
    }
}
