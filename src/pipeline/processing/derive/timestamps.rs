//! Timestamp parsing across the formats marketplace exports actually use.
//!
//! Every parser returns `None` on failure; nothing here errors.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static UK_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})$").expect("static regex"));

// "18th December 2025", "Mon 18 Dec 2025", "18th of December, 2025"
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z]+,?\s+)?(\d{1,2})(?:st|nd|rd|th)?(?:\s+of)?\s+([a-z]+)\.?,?\s+(\d{4})$")
        .expect("static regex")
});

// "December 18, 2025", "Dec 18th 2025"
static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z]+,?\s+)?([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$")
        .expect("static regex")
});

// Day and month without a year, anywhere in the text
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]{3,9})\b").expect("static regex")
});
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b").expect("static regex")
});

static RELATIVE_AGO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+)\s*(minute|min|hour|hr|day|week|wk|month)s?\s+ago$").expect("static regex")
});

/// Month number from an English month name or abbreviation (`Sept` included).
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|full| full.starts_with(&lower) || (lower == "sept" && *full == "september"))
        .map(|idx| idx as u32 + 1)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + year } else { year })
}

fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    // Year-first only; "07-02-26" must not become the year 7
    if !raw.get(..5).is_some_and(|p| p[..4].bytes().all(|b| b.is_ascii_digit()) && p.ends_with('-')) {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().and_then(midnight)
}

fn parse_uk_numeric(raw: &str) -> Option<DateTime<Utc>> {
    let caps = UK_NUMERIC.captures(raw)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year = expand_year(&caps[3])?;
    NaiveDate::from_ymd_opt(year, month, day).and_then(midnight)
}

fn parse_written(raw: &str) -> Option<DateTime<Utc>> {
    let (day, month, year) = if let Some(caps) = DAY_MONTH_YEAR.captures(raw) {
        (caps[1].parse().ok()?, month_from_name(&caps[2])?, caps[3].parse().ok()?)
    } else if let Some(caps) = MONTH_DAY_YEAR.captures(raw) {
        (caps[2].parse().ok()?, month_from_name(&caps[1])?, caps[3].parse().ok()?)
    } else {
        return None;
    };
    NaiveDate::from_ymd_opt(year, month, day).and_then(midnight)
}

/// Parse an absolute timestamp: ISO/RFC 3339, UK day-first numeric dates,
/// or written dates with month names and ordinal days.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_iso(raw)
        .or_else(|| parse_uk_numeric(raw))
        .or_else(|| parse_written(raw))
}

/// Parse a relative phrase ("3 days ago", "yesterday") against `anchor`.
pub fn parse_relative(raw: &str, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = raw.trim().to_lowercase();
    match text.as_str() {
        "today" | "just now" | "now" => return Some(anchor),
        "yesterday" => return Some(anchor - Duration::days(1)),
        _ => {}
    }

    let caps = RELATIVE_AGO.captures(&text)?;
    let n: i64 = caps[1].parse().ok()?;
    let delta = match &caps[2] {
        "minute" | "min" => Duration::try_minutes(n),
        "hour" | "hr" => Duration::try_hours(n),
        "day" => Duration::try_days(n),
        "week" | "wk" => Duration::try_weeks(n),
        // Months are taken as 30 days
        "month" => n.checked_mul(30).and_then(Duration::try_days),
        _ => None,
    }?;
    anchor.checked_sub_signed(delta)
}

/// Absolute parse first, then relative to `anchor`.
pub fn parse_timestamp_or_relative(raw: &str, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
    parse_timestamp(raw).or_else(|| parse_relative(raw, anchor))
}

/// Day and month from text that carries no year ("7th February", "Feb 7").
pub fn parse_day_month(raw: &str) -> Option<(u32, u32)> {
    for caps in DAY_MONTH.captures_iter(raw) {
        if let (Ok(day), Some(month)) = (caps[1].parse::<u32>(), month_from_name(&caps[2])) {
            if (1..=31).contains(&day) {
                return Some((day, month));
            }
        }
    }
    for caps in MONTH_DAY.captures_iter(raw) {
        if let (Some(month), Ok(day)) = (month_from_name(&caps[1]), caps[2].parse::<u32>()) {
            if (1..=31).contains(&day) {
                return Some((day, month));
            }
        }
    }
    None
}

/// Whole days from `from` to `to`, rounded towards negative infinity.
pub fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(86_400)
}

/// RFC 3339 rendering used in every output table
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_iso_variants() {
        assert_eq!(parse_timestamp("2025-12-18"), Some(ymd(2025, 12, 18)));
        assert_eq!(
            parse_timestamp("2025-12-18T10:30:00Z"),
            Some(Utc.with_ymd_and_hms(2025, 12, 18, 10, 30, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2025-12-18 10:30:00"),
            Some(Utc.with_ymd_and_hms(2025, 12, 18, 10, 30, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2025-12-18T10:30:00+01:00"),
            Some(Utc.with_ymd_and_hms(2025, 12, 18, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn parses_uk_day_first_dates() {
        assert_eq!(parse_timestamp("07/02/2026"), Some(ymd(2026, 2, 7)));
        assert_eq!(parse_timestamp("7-2-2026"), Some(ymd(2026, 2, 7)));
        assert_eq!(parse_timestamp("07.02.26"), Some(ymd(2026, 2, 7)));
        assert_eq!(parse_timestamp("31/02/2026"), None);
    }

    #[test]
    fn parses_written_dates() {
        assert_eq!(parse_timestamp("18th December 2025"), Some(ymd(2025, 12, 18)));
        assert_eq!(parse_timestamp("1st of Sept, 2025"), Some(ymd(2025, 9, 1)));
        assert_eq!(parse_timestamp("December 18, 2025"), Some(ymd(2025, 12, 18)));
        assert_eq!(parse_timestamp("Thu 18 Dec 2025"), Some(ymd(2025, 12, 18)));
    }

    #[test]
    fn total_failure_is_null() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("ready soon"), None);
        assert_eq!(parse_timestamp("18th Smarch 2025"), None);
    }

    #[test]
    fn relative_phrases_resolve_against_anchor() {
        let anchor = ymd(2026, 1, 10);
        assert_eq!(parse_relative("6 days ago", anchor), Some(ymd(2026, 1, 4)));
        assert_eq!(parse_relative("2 weeks ago", anchor), Some(ymd(2025, 12, 27)));
        assert_eq!(parse_relative("1 month ago", anchor), Some(ymd(2025, 12, 11)));
        assert_eq!(parse_relative("Yesterday", anchor), Some(ymd(2026, 1, 9)));
        assert_eq!(parse_relative("soon", anchor), None);
        assert_eq!(parse_timestamp_or_relative("2026-01-01", anchor), Some(ymd(2026, 1, 1)));
    }

    #[test]
    fn relative_counts_at_the_edges() {
        let anchor = ymd(2026, 1, 10);
        assert_eq!(parse_relative("0 days ago", anchor), Some(anchor));
        assert_eq!(parse_relative("-3 days ago", anchor), None);
    }

    #[test]
    fn out_of_range_relative_phrase_is_null() {
        let anchor = ymd(2026, 1, 10);
        for raw in [
            "100000000 days ago",
            "99999999999999 minutes ago",
            "9999999999999999 weeks ago",
            "999999999999999999 months ago",
            "99999999999999999999 days ago",
        ] {
            assert_eq!(parse_relative(raw, anchor), None, "{raw}");
            assert_eq!(parse_timestamp_or_relative(raw, anchor), None, "{raw}");
        }
    }

    #[test]
    fn formatting_keeps_fractional_seconds() {
        let whole = ymd(2026, 1, 22);
        assert_eq!(format_timestamp(&whole), "2026-01-22T00:00:00Z");

        let fractional = whole + Duration::milliseconds(250);
        let rendered = format_timestamp(&fractional);
        assert_eq!(rendered, "2026-01-22T00:00:00.250Z");
        assert_eq!(DateTime::parse_from_rfc3339(&rendered).unwrap().with_timezone(&Utc), fractional);
    }

    #[test]
    fn day_month_without_year() {
        assert_eq!(parse_day_month("7th February"), Some((7, 2)));
        assert_eq!(parse_day_month("ready 22nd of Nov"), Some((22, 11)));
        assert_eq!(parse_day_month("Feb 7"), Some((7, 2)));
        assert_eq!(parse_day_month("8 weeks"), None);
    }

    #[test]
    fn day_difference_floors() {
        let from = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(whole_days_between(from, ymd(2026, 1, 12)), 1);
        assert_eq!(whole_days_between(from, ymd(2026, 1, 10)), -1);
        assert_eq!(whole_days_between(ymd(2026, 1, 10), ymd(2026, 1, 10)), 0);
    }

    #[test]
    fn months_match_on_prefix() {
        assert_eq!(month_from_name("Sept"), Some(9));
        assert_eq!(month_from_name("sep"), Some(9));
        assert_eq!(month_from_name("December"), Some(12));
        assert_eq!(month_from_name("ma"), None);
        assert_eq!(month_from_name("weeks"), None);
    }
}
