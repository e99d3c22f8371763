//! Date helper functions

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::time::SystemTime;

/// Absolute date/time formats accepted for a post's `time` field
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Time-of-day formats, applied against the post's own date
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%I:%M%p"];

/// Resolve a date/time expression against a base date.
///
/// Full dates replace the base entirely, bare times of day keep the base's
/// calendar date. Returns `None` when nothing matches.
pub fn resolve_time(base: NaiveDate, expr: &str) -> Option<NaiveDateTime> {
    let expr = expr.trim();

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(expr, fmt) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    // %p only matches upper-case AM/PM
    let upper = expr.to_uppercase();
    for fmt in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&upper, fmt) {
            return Some(base.and_time(time));
        }
    }

    None
}

/// Interpret a naive date/time in the local timezone
pub fn to_local(dt: NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&dt)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&dt))
}

/// Format a date with a strftime-style format string
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format(format).to_string()
}

/// RFC 7231 date, as used by the `Date` and `Last-Modified` headers
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Parse an HTTP date header value into seconds since the epoch
pub fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp());
    }
    // RFC 850 / asctime fallbacks
    for fmt in ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_resolve_time_of_day() {
        let dt = resolve_time(base(), "14:30").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00");

        let dt = resolve_time(base(), "2:05 pm").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:05:00");
    }

    #[test]
    fn test_resolve_full_datetime_overrides_base() {
        let dt = resolve_time(base(), "2023-12-01 08:00").unwrap();
        assert_eq!(dt.to_string(), "2023-12-01 08:00:00");
    }

    #[test]
    fn test_resolve_garbage() {
        assert!(resolve_time(base(), "someday").is_none());
    }

    #[test]
    fn test_format_date() {
        let date = Local.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_date(&date, "%Y-%m-%d"), "2024-01-15");
        assert_eq!(format_date(&date, "%B %d, %Y"), "January 15, 2024");
    }

    #[test]
    fn test_http_date_round_trip() {
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        let formatted = http_date(time);
        assert_eq!(formatted, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date(&formatted), Some(784_111_777));
    }

    #[test]
    fn test_parse_http_date_variants() {
        assert_eq!(
            parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"),
            Some(784_111_777)
        );
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), Some(784_111_777));
        assert_eq!(parse_http_date("yesterday"), None);
    }
}
