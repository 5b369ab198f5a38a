//! Time grains
//!
//! Calendar-aware bucketing resolutions for the time-series engine.
//! Grains form a fixed total order from coarsest (year) to finest (hour),
//! used to validate drill-down and grain requests.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Time-bucketing resolution
///
/// Variants are declared coarsest to finest; the derived ordering follows
/// that declaration (`Grain::Year < Grain::Hour`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    /// Calendar year
    Year,
    /// Calendar quarter (Jan/Apr/Jul/Oct)
    Quarter,
    /// Calendar month
    Month,
    /// ISO week (starts on Monday)
    Week,
    /// Calendar day
    Day,
    /// Clock hour
    Hour,
}

impl Grain {
    /// All grains, coarsest first
    pub fn all() -> &'static [Grain] {
        &[
            Grain::Year,
            Grain::Quarter,
            Grain::Month,
            Grain::Week,
            Grain::Day,
            Grain::Hour,
        ]
    }

    /// Whether this grain is coarser than another (year is coarsest)
    pub fn is_coarser_than(&self, other: Grain) -> bool {
        *self < other
    }

    /// Truncate a Unix-millisecond timestamp to the start of its bucket
    ///
    /// Calendar-aware: weeks truncate to the ISO Monday, quarters to the
    /// first day of the calendar quarter. Out-of-range timestamps are
    /// returned unchanged.
    pub fn truncate(&self, timestamp: i64) -> i64 {
        let dt = match Utc.timestamp_millis_opt(timestamp) {
            chrono::LocalResult::Single(dt) => dt,
            _ => return timestamp,
        };

        let truncated = match self {
            Grain::Year => start_of_day(dt)
                .and_then(|d| d.with_day(1))
                .and_then(|d| d.with_month(1)),
            Grain::Quarter => {
                let quarter_month = ((dt.month() - 1) / 3) * 3 + 1;
                start_of_day(dt)
                    .and_then(|d| d.with_day(1))
                    .and_then(|d| d.with_month(quarter_month))
            }
            Grain::Month => start_of_day(dt).and_then(|d| d.with_day(1)),
            Grain::Week => {
                let days_since_monday = dt.weekday().num_days_from_monday() as i64;
                start_of_day(dt - Duration::days(days_since_monday))
            }
            Grain::Day => start_of_day(dt),
            Grain::Hour => dt
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0)),
        };

        truncated.map(|d| d.timestamp_millis()).unwrap_or(timestamp)
    }

    /// Start of the bucket following `bucket` (a truncated timestamp)
    pub fn advance(&self, bucket: i64) -> i64 {
        let dt = match Utc.timestamp_millis_opt(bucket) {
            chrono::LocalResult::Single(dt) => dt,
            _ => return bucket,
        };

        let next = match self {
            Grain::Year => dt.checked_add_months(Months::new(12)),
            Grain::Quarter => dt.checked_add_months(Months::new(3)),
            Grain::Month => dt.checked_add_months(Months::new(1)),
            Grain::Week => Some(dt + Duration::weeks(1)),
            Grain::Day => Some(dt + Duration::days(1)),
            Grain::Hour => Some(dt + Duration::hours(1)),
        };

        next.map(|d| d.timestamp_millis()).unwrap_or(bucket)
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "year" | "y" => Some(Grain::Year),
            "quarter" | "q" => Some(Grain::Quarter),
            "month" | "mo" => Some(Grain::Month),
            "week" | "w" => Some(Grain::Week),
            "day" | "d" => Some(Grain::Day),
            "hour" | "h" => Some(Grain::Hour),
            _ => None,
        }
    }
}

impl std::fmt::Display for Grain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grain::Year => write!(f, "year"),
            Grain::Quarter => write!(f, "quarter"),
            Grain::Month => write!(f, "month"),
            Grain::Week => write!(f, "week"),
            Grain::Day => write!(f, "day"),
            Grain::Hour => write!(f, "hour"),
        }
    }
}

fn start_of_day(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    dt.with_hour(0)
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-05-15 14:35:42.123 UTC (a Wednesday)
    const TS: i64 = 1715783742123;

    fn millis(s: &str) -> i64 {
        DateTime::parse_from_rfc3339(s).unwrap().timestamp_millis()
    }

    #[test]
    fn test_truncate_hour() {
        assert_eq!(Grain::Hour.truncate(TS), millis("2024-05-15T14:00:00Z"));
    }

    #[test]
    fn test_truncate_day() {
        assert_eq!(Grain::Day.truncate(TS), millis("2024-05-15T00:00:00Z"));
    }

    #[test]
    fn test_truncate_week_is_iso_monday() {
        assert_eq!(Grain::Week.truncate(TS), millis("2024-05-13T00:00:00Z"));
        // A Monday truncates to itself
        let monday = millis("2024-05-13T09:00:00Z");
        assert_eq!(Grain::Week.truncate(monday), millis("2024-05-13T00:00:00Z"));
    }

    #[test]
    fn test_truncate_month() {
        assert_eq!(Grain::Month.truncate(TS), millis("2024-05-01T00:00:00Z"));
    }

    #[test]
    fn test_truncate_quarter() {
        assert_eq!(Grain::Quarter.truncate(TS), millis("2024-04-01T00:00:00Z"));
        let january = millis("2024-01-20T10:00:00Z");
        assert_eq!(Grain::Quarter.truncate(january), millis("2024-01-01T00:00:00Z"));
        let december = millis("2024-12-31T23:59:59Z");
        assert_eq!(Grain::Quarter.truncate(december), millis("2024-10-01T00:00:00Z"));
    }

    #[test]
    fn test_truncate_year() {
        assert_eq!(Grain::Year.truncate(TS), millis("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_advance_handles_month_lengths() {
        let jan = millis("2024-01-01T00:00:00Z");
        assert_eq!(Grain::Month.advance(jan), millis("2024-02-01T00:00:00Z"));
        let feb = millis("2024-02-01T00:00:00Z");
        assert_eq!(Grain::Month.advance(feb), millis("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn test_advance_quarter_and_year() {
        let q4 = millis("2023-10-01T00:00:00Z");
        assert_eq!(Grain::Quarter.advance(q4), millis("2024-01-01T00:00:00Z"));
        let y = millis("2023-01-01T00:00:00Z");
        assert_eq!(Grain::Year.advance(y), millis("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_grain_ordering_coarsest_first() {
        assert!(Grain::Year.is_coarser_than(Grain::Quarter));
        assert!(Grain::Quarter.is_coarser_than(Grain::Hour));
        assert!(!Grain::Hour.is_coarser_than(Grain::Day));
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Grain::from_str("MONTH"), Some(Grain::Month));
        assert_eq!(Grain::from_str("w"), Some(Grain::Week));
        assert_eq!(Grain::from_str("decade"), None);
    }
}
