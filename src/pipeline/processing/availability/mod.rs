//! "Ready to leave" resolution: per-platform rules into one normalized
//! timestamp plus a confidence state.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AvailabilityConfig;
use crate::observability::metrics;
use crate::pipeline::processing::derive::timestamps::{parse_day_month, whole_days_between};
use crate::pipeline::processing::derive::DerivedRecord;
use crate::schema::CanonicalField;

static NOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:ready\s+)?now\s*!?\s*$").expect("static regex"));
static IN_WEEKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^\d-])(?:in\s*)?(\d+)\s*weeks?\b").expect("static regex"));

/// How a platform's `ready_to_leave` text is to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityRule {
    /// A real date or nothing
    ExactDate,
    /// "Now" / "in N weeks" relative to the anchor
    RelativePhrase,
    /// Relative phrases, day+month without a year, or full dates
    FreeText,
    /// "Now" against the run anchor, else a real date
    DirectDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityState {
    Now,
    InWeeks,
    DateAnchored,
    DobPlusEstimate,
    DateSuspicious,
    Missing,
    Unknown,
}

impl AvailabilityState {
    pub const ALL: [AvailabilityState; 7] = [
        AvailabilityState::Now,
        AvailabilityState::InWeeks,
        AvailabilityState::DateAnchored,
        AvailabilityState::DobPlusEstimate,
        AvailabilityState::DateSuspicious,
        AvailabilityState::Missing,
        AvailabilityState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Now => "now",
            AvailabilityState::InWeeks => "in_weeks",
            AvailabilityState::DateAnchored => "date_anchored",
            AvailabilityState::DobPlusEstimate => "dob_plus_estimate",
            AvailabilityState::DateSuspicious => "date_suspicious",
            AvailabilityState::Missing => "missing",
            AvailabilityState::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == label)
    }

    pub fn is_known(&self) -> bool {
        !matches!(
            self,
            AvailabilityState::Unknown | AvailabilityState::Missing | AvailabilityState::DateSuspicious
        )
    }
}

/// Resolved availability for one record
#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    pub state: AvailabilityState,
    pub ready_ts: Option<DateTime<Utc>>,
    pub days_until_ready: Option<i64>,
    pub is_ready_now: bool,
    pub is_waiting_list: bool,
    pub availability_known: bool,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            state: AvailabilityState::Missing,
            ready_ts: None,
            days_until_ready: None,
            is_ready_now: false,
            is_waiting_list: false,
            availability_known: false,
        }
    }
}

impl Availability {
    /// Derive the day count and flags from a state and timestamp
    pub fn from_state(state: AvailabilityState, ready_ts: Option<DateTime<Utc>>, asof: DateTime<Utc>) -> Self {
        let days_until_ready = ready_ts.map(|ts| whole_days_between(asof, ts));
        Self {
            state,
            ready_ts,
            days_until_ready,
            is_ready_now: days_until_ready.is_some_and(|d| d <= 0),
            is_waiting_list: days_until_ready.is_some_and(|d| d > 0),
            availability_known: state.is_known(),
        }
    }
}

/// Inputs the state machine reads from a derived record
#[derive(Debug, Clone, Copy)]
pub struct AvailabilitySignal<'a> {
    pub raw: Option<&'a str>,
    pub parsed: Option<DateTime<Utc>>,
    pub published: Option<DateTime<Utc>>,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub asof: DateTime<Utc>,
}

impl AvailabilitySignal<'_> {
    /// Relative phrases resolve against the publish time when known
    fn anchor(&self) -> DateTime<Utc> {
        self.published.unwrap_or(self.asof)
    }
}

pub struct AvailabilityResolver {
    config: AvailabilityConfig,
}

impl AvailabilityResolver {
    pub fn new(config: AvailabilityConfig) -> Self {
        Self { config }
    }

    fn in_weeks(signal: &AvailabilitySignal<'_>, raw: &str) -> Option<DateTime<Utc>> {
        let weeks: i64 = IN_WEEKS.captures(raw)?.get(1)?.as_str().parse().ok()?;
        signal.anchor().checked_add_signed(Duration::try_weeks(weeks)?)
    }

    /// Place a yearless day+month near the anchor: roll a long-past date
    /// into next year, distrust one still too far ahead.
    fn day_month(&self, signal: &AvailabilitySignal<'_>, day: u32, month: u32) -> (AvailabilityState, Option<DateTime<Utc>>) {
        let anchor = signal.anchor();
        let window = self.config.day_month_window_days;
        let at = |year: i32| {
            NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        };

        let Some(mut candidate) = at(anchor.year()) else {
            return (AvailabilityState::Unknown, None);
        };
        if whole_days_between(anchor, candidate) < -window {
            match at(anchor.year() + 1) {
                Some(next) => candidate = next,
                None => return (AvailabilityState::Unknown, None),
            }
        }
        if whole_days_between(anchor, candidate) > window {
            (AvailabilityState::DateSuspicious, None)
        } else {
            (AvailabilityState::DateAnchored, Some(candidate))
        }
    }

    fn apply_rule(&self, rule: AvailabilityRule, signal: &AvailabilitySignal<'_>) -> (AvailabilityState, Option<DateTime<Utc>>) {
        use AvailabilityState::*;

        let Some(raw) = signal.raw else {
            return (Missing, None);
        };

        match rule {
            AvailabilityRule::ExactDate => match signal.parsed {
                Some(ts) => (DateAnchored, Some(ts)),
                None => (Unknown, None),
            },
            AvailabilityRule::RelativePhrase => {
                if NOW.is_match(raw) {
                    (Now, Some(signal.anchor()))
                } else if let Some(ts) = Self::in_weeks(signal, raw) {
                    (InWeeks, Some(ts))
                } else if let Some(ts) = signal.parsed {
                    (DateAnchored, Some(ts))
                } else {
                    (Unknown, None)
                }
            }
            AvailabilityRule::FreeText => {
                if NOW.is_match(raw) {
                    (Now, Some(signal.anchor()))
                } else if let Some(ts) = Self::in_weeks(signal, raw) {
                    (InWeeks, Some(ts))
                } else if let Some(ts) = signal.parsed {
                    (DateAnchored, Some(ts))
                } else if let Some((day, month)) = parse_day_month(raw) {
                    self.day_month(signal, day, month)
                } else {
                    (Unknown, None)
                }
            }
            AvailabilityRule::DirectDate => {
                if NOW.is_match(raw) {
                    (Now, Some(signal.asof))
                } else if let Some(ts) = signal.parsed {
                    (DateAnchored, Some(ts))
                } else {
                    (Unknown, None)
                }
            }
        }
    }

    /// Run the platform rule, then fall back to a date-of-birth estimate
    /// when the rule found no usable signal.
    pub fn resolve(&self, rule: AvailabilityRule, signal: &AvailabilitySignal<'_>) -> Availability {
        let (mut state, mut ready_ts) = self.apply_rule(rule, signal);

        if matches!(state, AvailabilityState::Missing | AvailabilityState::Unknown) {
            let estimate = signal.date_of_birth.and_then(|dob| {
                Duration::try_weeks(self.config.dob_ready_weeks).and_then(|w| dob.checked_add_signed(w))
            });
            if let Some(ts) = estimate {
                state = AvailabilityState::DobPlusEstimate;
                ready_ts = Some(ts);
            }
        }

        Availability::from_state(state, ready_ts, signal.asof)
    }

    /// Return the record with its availability columns replaced
    pub fn apply(&self, rule: AvailabilityRule, record: DerivedRecord) -> DerivedRecord {
        let signal = AvailabilitySignal {
            raw: record.get(CanonicalField::ReadyToLeave),
            parsed: record.timestamps.ready_to_leave,
            published: record.timestamps.published_at,
            date_of_birth: record.timestamps.date_of_birth,
            asof: record.asof_ts,
        };
        let availability = self.resolve(rule, &signal);

        metrics::availability::state_resolved(availability.state.as_str());
        debug!(
            platform = record.platform(),
            row_index = record.fact.row_index,
            state = availability.state.as_str(),
            "Resolved availability"
        );

        DerivedRecord { availability, ..record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::derive::timestamps::parse_timestamp;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn resolver() -> AvailabilityResolver {
        AvailabilityResolver::new(AvailabilityConfig::default())
    }

    fn signal(raw: Option<&str>, published: Option<DateTime<Utc>>, asof: DateTime<Utc>) -> AvailabilitySignal<'_> {
        AvailabilitySignal {
            raw,
            parsed: raw.and_then(parse_timestamp),
            published,
            date_of_birth: None,
            asof,
        }
    }

    #[test]
    fn in_weeks_resolves_from_publish_anchor() {
        let s = signal(Some("in 2 weeks"), Some(ymd(2026, 1, 10)), ymd(2026, 1, 20));
        let a = resolver().resolve(AvailabilityRule::RelativePhrase, &s);
        assert_eq!(a.state, AvailabilityState::InWeeks);
        assert_eq!(a.ready_ts, Some(ymd(2026, 1, 24)));
        assert_eq!(a.days_until_ready, Some(4));
        assert!(a.is_waiting_list && !a.is_ready_now);
    }

    #[test]
    fn week_counts_at_the_edges() {
        let published = Some(ymd(2026, 1, 10));
        let asof = ymd(2026, 1, 20);

        let zero = resolver().resolve(AvailabilityRule::RelativePhrase, &signal(Some("in 0 weeks"), published, asof));
        assert_eq!(zero.state, AvailabilityState::InWeeks);
        assert_eq!(zero.ready_ts, published);
        assert!(zero.is_ready_now);

        let negative = resolver().resolve(AvailabilityRule::FreeText, &signal(Some("in -2 weeks"), published, asof));
        assert_eq!(negative.state, AvailabilityState::Unknown);
        assert_eq!(negative.ready_ts, None);
    }

    #[test]
    fn out_of_range_week_count_is_unknown() {
        let asof = ymd(2026, 1, 20);
        for raw in ["in 99999999 weeks", "in 99999999999999999 weeks", "in 999999999999999999999 weeks"] {
            let a = resolver().resolve(AvailabilityRule::RelativePhrase, &signal(Some(raw), None, asof));
            assert_eq!(a.state, AvailabilityState::Unknown, "{raw}");
            assert_eq!(a.ready_ts, None);
            assert_eq!(a.days_until_ready, None);
        }
    }

    #[test]
    fn out_of_range_week_count_falls_back_to_dob() {
        let s = AvailabilitySignal {
            date_of_birth: Some(ymd(2026, 1, 1)),
            ..signal(Some("in 99999999 weeks"), None, ymd(2026, 1, 20))
        };
        let a = resolver().resolve(AvailabilityRule::FreeText, &s);
        assert_eq!(a.state, AvailabilityState::DobPlusEstimate);
        assert_eq!(a.ready_ts, Some(ymd(2026, 2, 26)));
    }

    #[test]
    fn dob_estimate_that_overflows_stays_unknown() {
        let resolver = AvailabilityResolver::new(AvailabilityConfig {
            dob_ready_weeks: i64::MAX,
            ..AvailabilityConfig::default()
        });
        let s = AvailabilitySignal {
            date_of_birth: Some(ymd(2026, 1, 1)),
            ..signal(Some("soon"), None, ymd(2026, 1, 20))
        };
        let a = resolver.resolve(AvailabilityRule::FreeText, &s);
        assert_eq!(a.state, AvailabilityState::Unknown);
        assert_eq!(a.ready_ts, None);
    }

    #[test]
    fn anchor_falls_back_to_run_time() {
        let s = signal(Some("Now"), None, ymd(2026, 1, 20));
        let a = resolver().resolve(AvailabilityRule::RelativePhrase, &s);
        assert_eq!(a.state, AvailabilityState::Now);
        assert_eq!(a.ready_ts, Some(ymd(2026, 1, 20)));
        assert!(a.is_ready_now);
    }

    #[test]
    fn day_month_rolls_forward_a_year() {
        // 7 Feb is ~300 days before a December anchor
        let s = signal(Some("7th February"), Some(ymd(2025, 12, 5)), ymd(2025, 12, 10));
        let a = resolver().resolve(AvailabilityRule::FreeText, &s);
        assert_eq!(a.state, AvailabilityState::DateAnchored);
        assert_eq!(a.ready_ts, Some(ymd(2026, 2, 7)));
    }

    #[test]
    fn day_month_stays_in_anchor_year_when_close() {
        let s = signal(Some("22nd November"), Some(ymd(2025, 11, 1)), ymd(2025, 11, 10));
        let a = resolver().resolve(AvailabilityRule::FreeText, &s);
        assert_eq!(a.ready_ts, Some(ymd(2025, 11, 22)));
    }

    #[test]
    fn far_future_day_month_is_suspicious() {
        // 1 Jan is 183 days back; rolled forward it lands 182 days ahead
        let s = signal(Some("1st January"), Some(ymd(2025, 7, 3)), ymd(2025, 7, 3));
        let a = resolver().resolve(AvailabilityRule::FreeText, &s);
        assert_eq!(a.state, AvailabilityState::DateSuspicious);
        assert_eq!(a.ready_ts, None);
        assert!(!a.availability_known);
        assert!(!a.is_ready_now && !a.is_waiting_list);
    }

    #[test]
    fn exact_date_source() {
        let asof = ymd(2026, 1, 22);
        let dated = resolver().resolve(AvailabilityRule::ExactDate, &signal(Some("2026-02-01"), None, asof));
        assert_eq!(dated.state, AvailabilityState::DateAnchored);
        assert_eq!(dated.days_until_ready, Some(10));

        let empty = resolver().resolve(AvailabilityRule::ExactDate, &signal(None, None, asof));
        assert_eq!(empty.state, AvailabilityState::Missing);

        let garbled = resolver().resolve(AvailabilityRule::ExactDate, &signal(Some("soon"), None, asof));
        assert_eq!(garbled.state, AvailabilityState::Unknown);
    }

    #[test]
    fn dob_estimate_fills_missing_signal() {
        let mut s = signal(None, None, ymd(2026, 1, 22));
        s.date_of_birth = Some(ymd(2025, 12, 1));
        let a = resolver().resolve(AvailabilityRule::DirectDate, &s);
        assert_eq!(a.state, AvailabilityState::DobPlusEstimate);
        assert_eq!(a.ready_ts, Some(ymd(2026, 1, 26)));
        assert!(a.availability_known);
    }

    #[test]
    fn direct_date_now_uses_run_time() {
        let s = signal(Some("now"), Some(ymd(2025, 12, 1)), ymd(2026, 1, 22));
        let a = resolver().resolve(AvailabilityRule::DirectDate, &s);
        assert_eq!(a.ready_ts, Some(ymd(2026, 1, 22)));
        assert_eq!(a.days_until_ready, Some(0));
    }

    #[test]
    fn flags_are_mutually_exclusive_for_every_state() {
        let asof = ymd(2026, 1, 22);
        let inputs = [None, Some("now"), Some("in 3 weeks"), Some("2025-12-25"), Some("9th March"), Some("?")];
        let rules = [
            AvailabilityRule::ExactDate,
            AvailabilityRule::RelativePhrase,
            AvailabilityRule::FreeText,
            AvailabilityRule::DirectDate,
        ];
        for rule in rules {
            for raw in inputs {
                let a = resolver().resolve(rule, &signal(raw, None, asof));
                assert!(AvailabilityState::ALL.contains(&a.state));
                assert!(!(a.is_ready_now && a.is_waiting_list));
                assert_eq!(a.availability_known, a.state.is_known());
            }
        }
    }
}
