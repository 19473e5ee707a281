use crate::utils::validation::is_time_string;
use std::time::Duration;

/// Session lifetime when `JWT_AND_COOKIE_EXPIRES` is unset or malformed.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(30 * 60);

/// Parses an expiry time string (`30m`, `1h`, `500ms`, or a bare number of
/// seconds). Anything failing the time-string grammar yields `None`.
pub fn parse_time_string(value: &str) -> Option<Duration> {
    let value = value.trim();
    if !is_time_string(value) {
        return None;
    }

    let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (count, unit) = value.split_at(split);
    let count: u64 = count.parse().ok()?;

    let millis = match unit {
        "ms" => count,
        "" | "s" => count * 1_000,
        "m" => count * 60 * 1_000,
        "h" => count * 60 * 60 * 1_000,
        "d" => count * 24 * 60 * 60 * 1_000,
        "w" => count * 7 * 24 * 60 * 60 * 1_000,
        // calendar year, 365.25 days
        "y" => count * 31_557_600 * 1_000,
        _ => return None,
    };

    Some(Duration::from_millis(millis))
}

/// Resolves the configured session lifetime, falling back to 30 minutes.
pub fn session_expiry(raw: Option<String>) -> Duration {
    raw.and_then(|v| parse_time_string(&v)).unwrap_or(DEFAULT_EXPIRY)
}
