//! Formatting for health-probe metrics.
//!
//! Every formatter accepts the raw JSON value reported by the registry
//! (`null`, numbers, numeric strings or timestamps) and renders
//! [`PLACEHOLDER`] for missing or non-numeric input.

#![expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    reason = "metric values are reported as floating-point JSON numbers"
)]

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;

/// Rendered for absent or unparseable values.
pub const PLACEHOLDER: &str = "-";

const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;
const EPOCH_SECONDS_THRESHOLD: f64 = 1e6;
const WARN_RATIO: f64 = 0.05;
const DANGER_RATIO: f64 = 0.2;

fn numeric(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn epoch_millis(now: DateTime<Utc>) -> f64 {
    now.timestamp_millis() as f64
}

/// Interprets `value` as an absolute point in time.
///
/// Numbers above 1e12 are epoch milliseconds and numbers above 1e6 are epoch
/// seconds; smaller numbers are not timestamps. Strings are parsed as
/// RFC 3339 unless they are numeric.
#[must_use]
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    if let Some(number) = numeric(value) {
        let millis = if number.abs() > EPOCH_MILLIS_THRESHOLD {
            number
        } else if number.abs() > EPOCH_SECONDS_THRESHOLD {
            number * 1000.0
        } else {
            return None;
        };
        return DateTime::from_timestamp_millis(millis.round() as i64);
    }
    match value? {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        _ => None,
    }
}

/// Seconds remaining until `value`, clamped at zero.
///
/// Small numbers are durations in seconds; larger ones and date strings are
/// deadlines measured against `now`.
#[must_use]
pub fn remaining_seconds(value: Option<&Value>, now: DateTime<Utc>) -> Option<f64> {
    let seconds = match numeric(value) {
        Some(number) if number.abs() > EPOCH_MILLIS_THRESHOLD => {
            (number - epoch_millis(now)) / 1000.0
        }
        Some(number) if number.abs() > EPOCH_SECONDS_THRESHOLD => {
            number - epoch_millis(now) / 1000.0
        }
        Some(number) => number,
        None => {
            let deadline = parse_timestamp(value)?;
            deadline.signed_duration_since(now).num_milliseconds() as f64 / 1000.0
        }
    };
    Some(seconds.max(0.0))
}

/// Renders the time left until a deadline, e.g. `45 s`, `3 min`, `2 h`.
///
/// `fallback` is consulted only when `value` is absent or `null`.
#[must_use]
pub fn format_remaining(
    value: Option<&Value>,
    fallback: Option<&Value>,
    now: DateTime<Utc>,
) -> String {
    let source = value.filter(|candidate| !candidate.is_null()).or(fallback);
    let Some(seconds) = remaining_seconds(source, now) else {
        return PLACEHOLDER.to_owned();
    };
    if seconds <= 0.0 {
        "expired".to_owned()
    } else if seconds < 60.0 {
        format!("{:.0} s", seconds.round())
    } else if seconds < 3600.0 {
        format!("{:.0} min", (seconds / 60.0).round())
    } else {
        format!("{:.0} h", (seconds / 3600.0).round())
    }
}

fn trim_zero_fraction(rendered: &str) -> &str {
    rendered.strip_suffix(".0").unwrap_or(rendered)
}

/// Renders a latency in milliseconds: integers from 100 ms, one decimal below.
#[must_use]
pub fn format_latency(value: Option<&Value>) -> String {
    let Some(millis) = numeric(value) else {
        return PLACEHOLDER.to_owned();
    };
    if millis >= 100.0 {
        format!("{:.0} ms", millis.round())
    } else {
        let rendered = format!("{millis:.1}");
        format!("{} ms", trim_zero_fraction(&rendered))
    }
}

/// Reads an error rate given either as a 0-1 ratio or a 0-100 percentage.
fn error_ratio(value: Option<&Value>) -> Option<f64> {
    numeric(value).map(|number| if number > 1.0 { number / 100.0 } else { number })
}

/// Renders an error rate as a percentage with two decimals under 10 % and
/// one decimal otherwise.
#[must_use]
pub fn format_error_rate(value: Option<&Value>) -> String {
    let Some(ratio) = error_ratio(value) else {
        return PLACEHOLDER.to_owned();
    };
    let percent = ratio * 100.0;
    if percent >= 10.0 {
        format!("{percent:.1}%")
    } else {
        format!("{percent:.2}%")
    }
}

/// Severity band of an error rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorRateLevel {
    /// No usable value.
    Neutral,
    /// Below 5 %.
    Ok,
    /// From 5 % up to 20 %.
    Warn,
    /// 20 % or more.
    Danger,
}

impl ErrorRateLevel {
    /// Returns the level name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Danger => "danger",
        }
    }
}

impl fmt::Display for ErrorRateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an error rate given as a ratio or a percentage.
#[must_use]
pub fn error_rate_level(value: Option<&Value>) -> ErrorRateLevel {
    match error_ratio(value) {
        None => ErrorRateLevel::Neutral,
        Some(ratio) if ratio >= DANGER_RATIO => ErrorRateLevel::Danger,
        Some(ratio) if ratio >= WARN_RATIO => ErrorRateLevel::Warn,
        Some(_) => ErrorRateLevel::Ok,
    }
}

/// Renders a sample count with `,` thousands separators.
#[must_use]
pub fn format_sample_size(value: Option<&Value>) -> String {
    let Some(count) = numeric(value) else {
        return PLACEHOLDER.to_owned();
    };
    let rendered = format!("{:.3}", count.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let digits: Vec<char> = whole.chars().collect();
    let grouped = digits
        .rchunks(3)
        .rev()
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",");
    let sign = if count < 0.0 { "-" } else { "" };
    match fraction.trim_end_matches('0') {
        "" => format!("{sign}{grouped}"),
        decimals => format!("{sign}{grouped}.{decimals}"),
    }
}

/// Renders a timestamp as RFC 3339 in UTC.
#[must_use]
pub fn format_absolute_time(value: Option<&Value>) -> String {
    parse_timestamp(value).map_or_else(
        || PLACEHOLDER.to_owned(),
        |timestamp| timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
