//! Field helpers shared by the vendor parsers.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::ParseError;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number pattern"));

static DISTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(km|m)?\b").expect("distance pattern")
});

static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(onu number|total|number of)").expect("summary pattern")
});

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Placeholders devices print for "no value".
pub(crate) fn is_missing(value: &str) -> bool {
    matches!(
        value.trim(),
        "" | "-" | "--" | "N/A" | "n/a" | "NA" | "0000-00-00 00:00:00"
    )
}

/// Normalize `0011.2233.4455`, `00-11-22-33-44-55` or `001122334455`
/// to `00:11:22:33:44:55`.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let hex = hex.to_ascii_lowercase();
    let parts: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Some(parts.join(":"))
}

/// First decimal number in `value`, e.g. `-21.50(dbm)` or `2.3 dBm`.
pub(crate) fn parse_power(value: &str) -> Option<f64> {
    if is_missing(value) {
        return None;
    }
    NUMBER.find(value)?.as_str().parse().ok()
}

/// Distance in meters from `1234m`, `1234`, or `1.2 km`.
pub(crate) fn parse_distance(value: &str) -> Option<u32> {
    let caps = DISTANCE.captures(value)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let meters = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit == "km" => number * 1000.0,
        _ => number,
    };
    Some(meters.round() as u32)
}

pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if is_missing(value) {
        return None;
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

pub(crate) fn parse_leading_u16(value: &str) -> Option<u16> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Dashed or double-dashed table rules.
pub(crate) fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| matches!(c, '-' | '=' | '+' | ' '))
}

/// Fail when `text` clearly holds table rows but none matched.
///
/// A line counts as a row when it matches `identifier`, or when it follows
/// a table rule and is not a trailing summary. Headers, rules and empty
/// tables pass.
pub(crate) fn ensure_recognized(
    what: &'static str,
    text: &str,
    matched: usize,
    identifier: &Regex,
) -> Result<(), ParseError> {
    if matched > 0 {
        return Ok(());
    }

    let mut after_separator = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_separator(trimmed) {
            after_separator = true;
            continue;
        }
        if identifier.is_match(line) || (after_separator && !SUMMARY.is_match(trimmed)) {
            return Err(ParseError::UnrecognizedShape {
                what,
                line: trimmed.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("0011.2233.4455").as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(normalize_mac("00-1A-2B-3C-4D-5E").as_deref(), Some("00:1a:2b:3c:4d:5e"));
        assert_eq!(normalize_mac("001a2b3c4d5e").as_deref(), Some("00:1a:2b:3c:4d:5e"));
        assert_eq!(normalize_mac("00:1a:2b"), None);
        assert_eq!(normalize_mac("zz:1a:2b:3c:4d:5e"), None);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_power("-21.50(dbm)"), Some(-21.5));
        assert_eq!(parse_power("2.31 dBm"), Some(2.31));
        assert_eq!(parse_power("N/A"), None);
        assert_eq!(parse_distance("1234m"), Some(1234));
        assert_eq!(parse_distance("1.2 km"), Some(1200));
        assert_eq!(parse_distance("850"), Some(850));
        assert_eq!(parse_distance("unknown"), None);
        assert_eq!(parse_leading_u16("100 (tagged)"), Some(100));
    }

    #[test]
    fn test_timestamps() {
        let ts = parse_timestamp("2024-03-01 10:00:00").unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 10:00:00");
        assert!(parse_timestamp("2024/03/01 10:00:00").is_some());
        assert!(parse_timestamp("0000-00-00 00:00:00").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_ensure_recognized() {
        let identifier = Regex::new(r"^\s*\d+/\d+").unwrap();

        // header and rule only: an empty table
        let empty = "OnuIndex  State\n----------------\nONU Number: 0/0\n";
        assert!(ensure_recognized("onu state", empty, 0, &identifier).is_ok());

        let garbled = "OnuIndex  State\n----------------\n1/1 ???\n";
        assert!(ensure_recognized("onu state", garbled, 0, &identifier).is_err());

        assert!(ensure_recognized("onu state", "", 0, &identifier).is_ok());
        assert!(ensure_recognized("onu state", "1/1 ok", 1, &identifier).is_ok());
    }
}
