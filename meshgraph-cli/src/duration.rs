use std::time::Duration;

use anyhow::{bail, Result};

/// Suffix to milliseconds multiplier (order matters: `ms` before `m` and `s`)
const UNITS: &[(&str, f64)] = &[
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
];

/// Parse duration strings like "500ms", "60s", "1.5m" or "2h".
///
/// A bare number is read as milliseconds, which is how window lengths are
/// written in pipeline definitions.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    let (value, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| s.strip_suffix(suffix).map(|v| (v, *multiplier)))
        .unwrap_or((s, 1.0));

    let value: f64 = match value.trim().parse() {
        Ok(value) => value,
        Err(_) => bail!("Unknown duration format: {}", s),
    };
    if !value.is_finite() || value < 0.0 {
        bail!("Duration must be a non-negative number: {}", s);
    }
    Ok(Duration::from_micros((value * multiplier * 1_000.0).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_milliseconds() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn parse_seconds() {
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1_500));
    }

    #[test]
    fn parse_minutes_and_hours() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3_600));
    }

    #[test]
    fn bare_numbers_are_milliseconds() {
        assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_with_whitespace() {
        assert_eq!(parse_duration("  100ms  ").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn parse_unknown_format_fails() {
        assert!(parse_duration("100x").is_err());
        assert!(parse_duration("abcms").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn negative_durations_fail() {
        assert!(parse_duration("-5s").is_err());
    }
}
