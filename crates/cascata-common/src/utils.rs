//! Utility functions for Cascata
//!
//! The duration grammar here matches the platform's property format, where
//! time periods are written as a count plus a unit, e.g. "1 min", "30 secs",
//! "12 hours".

use std::sync::LazyLock;
use std::time::Duration;

use md5::{Digest, Md5};

use crate::error::CascataError;

static TIME_PERIOD_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^(\d+)\s*([a-zA-Z]+)$").expect("Invalid regex pattern")
});

/// Parse a time period property value into a [`Duration`]
///
/// Accepted units (case-insensitive): `ns`/`nano(s)`/`nanoseconds`,
/// `ms`/`milli(s)`/`milliseconds`, `s`/`sec(s)`/`second(s)`,
/// `m`/`min(s)`/`minute(s)`, `h`/`hr(s)`/`hour(s)`, `d`/`day(s)`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cascata_common::parse_time_period;
///
/// assert_eq!(parse_time_period("1 min").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_time_period("12 hours").unwrap(), Duration::from_secs(12 * 3600));
/// assert!(parse_time_period("soon").is_err());
/// ```
pub fn parse_time_period(value: &str) -> Result<Duration, CascataError> {
    let trimmed = value.trim();
    let captures = TIME_PERIOD_PATTERN
        .captures(trimmed)
        .ok_or_else(|| CascataError::IllegalArgument(format!("invalid time period '{value}'")))?;

    let count: u64 = captures[1]
        .parse()
        .map_err(|_| CascataError::IllegalArgument(format!("invalid time period '{value}'")))?;

    let duration = match captures[2].to_ascii_lowercase().as_str() {
        "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => Duration::from_nanos(count),
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => Duration::from_millis(count),
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::from_secs(count),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::from_secs(count * 60),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::from_secs(count * 3600),
        "d" | "day" | "days" => Duration::from_secs(count * 86_400),
        unit => {
            return Err(CascataError::IllegalArgument(format!(
                "unknown time unit '{unit}'"
            )));
        }
    };

    Ok(duration)
}

/// Lowercase hex MD5 digest of a string
///
/// The output is always 32 characters; leading zeros are preserved.
pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    const_hex::encode(hasher.finalize())
}

/// Raw MD5 digest of a string
pub fn md5_bytes(input: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hasher.finalize().into()
}
