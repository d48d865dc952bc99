//! Input sanitization for identifiers, free text and timestamps.
//!
//! Every function returns `None` for blank or disallowed input; there is no
//! escaping or repair.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::tick::Tick;

/// Letters, digits, underscore, space and `|.;,-`.
const SAFE_STRING_PATTERN: &str = r"^[A-Za-z0-9_ |.;,\-]+$";

/// Safe-string characters plus ASCII whitespace and `:!?$%#+*/()\`.
const SAFE_TEXT_PATTERN: &str = r"^[A-Za-z0-9_\t\n\x0B\x0C\r |.:,;!?$%#+*/()\\\-]+$";

fn matches(cell: &OnceLock<Option<Regex>>, pattern: &str, input: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(input))
}

static SAFE_STRING: OnceLock<Option<Regex>> = OnceLock::new();
static SAFE_TEXT: OnceLock<Option<Regex>> = OnceLock::new();

fn is_blank(input: &str) -> bool {
    input.trim().is_empty()
}

/// Identifiers: application, environment, version, release name.
pub fn safe_string(input: &str) -> Option<&str> {
    if is_blank(input) {
        return None;
    }
    matches(&SAFE_STRING, SAFE_STRING_PATTERN, input).then_some(input)
}

/// [`safe_string`] that is also at most `max_len` characters long.
pub fn safe_string_within_length(input: &str, max_len: usize) -> Option<&str> {
    if input.chars().count() > max_len {
        return None;
    }
    safe_string(input)
}

/// Multi-line free text: description, changes, responsibility, build location.
pub fn safe_text(input: &str) -> Option<&str> {
    if is_blank(input) {
        return None;
    }
    matches(&SAFE_TEXT, SAFE_TEXT_PATTERN, input).then_some(input)
}

/// A decimal tick naming a representable instant.
///
/// Negative ticks are rejected: releases are never dated before the epoch.
pub fn tick(input: &str) -> Option<Tick> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let tick: Tick = input.parse().ok()?;
    tick.to_datetime().map(|_| tick)
}

/// An ISO 8601 date-time with offset. Seconds may be omitted
/// (`2024-08-23T16:52+02:00`).
pub fn offset_date_time(input: &str) -> Option<DateTime<Utc>> {
    if is_blank(input) {
        return None;
    }
    DateTime::parse_from_rfc3339(input)
        .or_else(|_| DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M%:z"))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn safe_string_accepts_allowed_characters() {
        assert_eq!(safe_string("release-tracker"), Some("release-tracker"));
        assert_eq!(safe_string("a1Z |.;,-"), Some("a1Z |.;,-"));
    }

    #[test]
    fn safe_string_rejects_blank_and_markup() {
        assert_eq!(safe_string(""), None);
        assert_eq!(safe_string(" "), None);
        assert_eq!(safe_string("<"), None);
        assert_eq!(safe_string("1.2.0\n"), None);
        assert_eq!(safe_string("grüße"), None);
    }

    #[test]
    fn safe_string_within_length_caps() {
        assert_eq!(
            safe_string_within_length("release-tracker", 15),
            Some("release-tracker")
        );
        assert_eq!(
            safe_string_within_length("release-tracker-name-too-long", 10),
            None
        );
    }

    #[test]
    fn safe_text_accepts_prose() {
        let text = "This is a test text!\n\nAllowed: |.:,;!?$%#+*/()-\\\nA tab \t too\n";
        assert_eq!(safe_text(text), Some(text));
    }

    #[test]
    fn safe_text_rejects_braces() {
        assert_eq!(safe_text("Curly braces are not allowed {}"), None);
        assert_eq!(safe_text("\n\t"), None);
    }

    #[test]
    fn tick_accepts_only_plain_digits() {
        assert_eq!(tick("1724424720123456789"), Some(Tick::new(1_724_424_720_123_456_789i64)));
        assert_eq!(tick(" 0 "), Some(Tick::new(0)));
        assert_eq!(tick("-1"), None);
        assert_eq!(tick("+1"), None);
        assert_eq!(tick("1e9"), None);
        assert_eq!(tick(""), None);
        assert_eq!(tick("99999999999999999999999999999999999"), None);
    }

    #[test]
    fn offset_date_time_with_and_without_seconds() {
        let expected = Utc.with_ymd_and_hms(2024, 8, 23, 14, 52, 0).unwrap();
        assert_eq!(
            offset_date_time("2024-08-23T16:52:00.000+02:00"),
            Some(expected)
        );
        assert_eq!(offset_date_time("2024-08-23T16:52+02:00"), Some(expected));
        assert_eq!(offset_date_time("2024-08-23 16:52"), None);
        assert_eq!(offset_date_time(""), None);
    }
}
