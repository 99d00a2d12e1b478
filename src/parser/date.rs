//! `Date:` header parsing.
//!
//! Real mail carries every imaginable date layout, so parsing runs through a
//! list of candidates: strict RFC 2822, RFC 3339, a set of loose formats,
//! then mail-parser as the last resort.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

/// Loose layouts tried after the strict parsers fail.
const LOOSE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Obsolete zone names, longest first so `CEST` wins over `EST`.
const NAMED_ZONES: &[(&str, &str)] = &[
    ("CEST", "+0200"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("UT", "+0000"),
    ("CET", "+0100"),
    ("JST", "+0900"),
];

const WEEKDAYS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parse a `Date:` header value into UTC.
///
/// Returns `None` (and logs at debug level) when no layout matches.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = strip_trailing_comment(value.trim());
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let bare = strip_weekday(trimmed);
    let zoned = replace_named_zone(bare);
    for candidate in [bare, zoned.as_str()] {
        if let Some(dt) = parse_loose(candidate) {
            return Some(dt);
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

fn parse_loose(candidate: &str) -> Option<DateTime<Utc>> {
    LOOSE_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(candidate, fmt)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(candidate, fmt)
                    .ok()
                    .map(|ndt| Utc.from_utc_datetime(&ndt))
            })
    })
}

/// Let mail-parser have a go by wrapping the value in a one-header message.
fn mail_parser_date(value: &str) -> Option<DateTime<Utc>> {
    let wrapped = format!("Date: {value}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(wrapped.as_bytes())?;
    let rfc3339 = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `"... -0800 (PST)"` → `"... -0800"`
fn strip_trailing_comment(s: &str) -> &str {
    match (s.ends_with(')'), s.rfind('(')) {
        (true, Some(open)) => s[..open].trim_end(),
        _ => s,
    }
}

/// `"Thu, 1 Feb 2024 ..."` → `"1 Feb 2024 ..."`
fn strip_weekday(s: &str) -> &str {
    for day in WEEKDAYS {
        if let Some(rest) = s.strip_prefix(day) {
            let rest = rest.strip_prefix(',').unwrap_or(rest);
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    s
}

fn replace_named_zone(s: &str) -> String {
    for (name, offset) in NAMED_ZONES {
        if let Some(head) = s.strip_suffix(name) {
            if head.ends_with(char::is_whitespace) {
                return format!("{head}{offset}");
            }
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono::Timelike;

    #[test]
    fn test_rfc2822() {
        let dt = parse_date("Mon, 1 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_offset_converted_to_utc() {
        let dt = parse_date("Tue, 2 Jan 2024 09:30:00 +0200").unwrap();
        assert_eq!(dt.hour(), 7);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_trailing_comment() {
        let dt = parse_date("Wed, 3 Jan 2024 08:00:00 -0800 (PST)").unwrap();
        assert_eq!(dt.hour(), 16);
    }

    #[test]
    fn test_named_zone_longest_match() {
        let dt = parse_date("4 Jan 2024 12:00:00 CEST").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_without_weekday_or_zone() {
        let dt = parse_date("5 Jan 2024 06:15:00").unwrap();
        assert_eq!(dt.day(), 5);
        assert_eq!(dt.hour(), 6);
    }

    #[test]
    fn test_iso8601() {
        let dt = parse_date("2024-01-06T11:00:00Z").unwrap();
        assert_eq!(dt.day(), 6);
        assert_eq!(dt.hour(), 11);
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date").is_none());
    }
}
