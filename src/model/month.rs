//! Calendar-month partition keys and the date/time parsing rules that decide which month a
//! record belongs to.

use anyhow::{bail, Context};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S";

/// Identifies a time partition, i.e. one calendar month. Displays as the partition name, e.g.
/// `January 2024`. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// `month` is 1-based. Returns `None` if it is out of range.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }

    /// All twelve months of `year`.
    pub fn year_months(year: i32) -> impl Iterator<Item = MonthKey> {
        (1..=12).map(move |month| MonthKey { year, month })
    }

    /// Parses the `YYYY-MM` form used in query filters.
    pub fn parse_numeric(s: &str) -> crate::error::Res<Self> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .with_context(|| format!("Expected a month in the form YYYY-MM, got '{s}'"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("Invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("Invalid month in '{s}'"))?;
        MonthKey::new(year, month).with_context(|| format!("Month out of range in '{s}'"))
    }

    fn name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name(), self.year)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    /// Parses a partition name like `March 2025`. Month names are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(name), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
            bail!("'{s}' is not a month partition name");
        };
        let Some(ix) = MONTH_NAMES
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))
        else {
            bail!("'{name}' is not a month name");
        };
        let year: i32 = year
            .parse()
            .with_context(|| format!("'{year}' is not a year"))?;
        Ok(Self {
            year,
            month: ix as u32 + 1,
        })
    }
}

impl Serialize for MonthKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MonthKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Parses a date cell or a wire `date` value. Accepts `YYYY-MM-DD`, naive date-times with a `T`
/// or a space separator, and RFC 3339 date-times. A date-time also yields its time-of-day, taken
/// as the wall-clock time in the value's own offset.
pub(crate) fn parse_date_time(raw: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        let local = dt.naive_local();
        return Some((local.date(), Some(whole_seconds(local.time()))));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some((ndt.date(), Some(whole_seconds(ndt.time()))));
        }
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .map(|date| (date, None))
}

/// Parses a time cell, `HH:MM:SS` or `HH:MM`.
pub(crate) fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
        .map(whole_seconds)
}

/// Parses a stored timestamp cell.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw.trim()).ok()
}

/// Resolves a possibly missing or malformed date into the month partition it belongs to. Anything
/// that does not parse lands in the month of `now`.
pub fn month_for(raw: Option<&str>, now: DateTime<FixedOffset>) -> MonthKey {
    match raw.and_then(parse_date_time) {
        Some((date, _)) => MonthKey::from_date(date),
        None => MonthKey::from_date(now.date_naive()),
    }
}

fn whole_seconds(t: NaiveTime) -> NaiveTime {
    t.with_nanosecond(0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-06-15T10:30:00+02:00").unwrap()
    }

    #[test]
    fn test_display() {
        assert_eq!(MonthKey::new(2024, 1).unwrap().to_string(), "January 2024");
        assert_eq!(MonthKey::new(2025, 12).unwrap().to_string(), "December 2025");
        assert!(MonthKey::new(2025, 13).is_none());
        assert!(MonthKey::new(2025, 0).is_none());
    }

    #[test]
    fn test_from_str() {
        let key: MonthKey = "March 2025".parse().unwrap();
        assert_eq!(key, MonthKey::new(2025, 3).unwrap());
        let key: MonthKey = "march   2025".parse().unwrap();
        assert_eq!(key, MonthKey::new(2025, 3).unwrap());
        assert!("Income".parse::<MonthKey>().is_err());
        assert!("Summary".parse::<MonthKey>().is_err());
        assert!("Smarch 2025".parse::<MonthKey>().is_err());
        assert!("March 2025 extra".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(
            MonthKey::parse_numeric("2024-01").unwrap(),
            MonthKey::new(2024, 1).unwrap()
        );
        assert!(MonthKey::parse_numeric("2024-13").is_err());
        assert!(MonthKey::parse_numeric("January").is_err());
    }

    #[test]
    fn test_ordering_is_chronological() {
        let mut keys = vec![
            MonthKey::new(2025, 1).unwrap(),
            MonthKey::new(2024, 12).unwrap(),
            MonthKey::new(2024, 2).unwrap(),
        ];
        keys.sort();
        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["February 2024", "December 2024", "January 2025"]);
    }

    #[test]
    fn test_parse_date_only() {
        let (date, time) = parse_date_time("2024-01-15").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(time.is_none());
    }

    #[test]
    fn test_parse_iso_date_times() {
        let (date, time) = parse_date_time("2024-01-15T08:09:10.123Z").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(time, NaiveTime::from_hms_opt(8, 9, 10));

        let (date, time) = parse_date_time("2024-02-29T23:59:59").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(time, NaiveTime::from_hms_opt(23, 59, 59));

        let (_, time) = parse_date_time("2024-03-01 07:00:00").unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(7, 0, 0));
    }

    #[test]
    fn test_parse_bad_dates() {
        assert!(parse_date_time("").is_none());
        assert!(parse_date_time("yesterday").is_none());
        assert!(parse_date_time("2024-02-30").is_none());
        assert!(parse_date_time("15/01/2024").is_none());
    }

    #[test]
    fn test_month_for_falls_back_to_now() {
        assert_eq!(
            month_for(Some("2024-01-20"), now()),
            MonthKey::new(2024, 1).unwrap()
        );
        assert_eq!(month_for(Some("garbage"), now()), MonthKey::new(2025, 6).unwrap());
        assert_eq!(month_for(None, now()), MonthKey::new(2025, 6).unwrap());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("08:15:00"), NaiveTime::from_hms_opt(8, 15, 0));
        assert_eq!(parse_time("08:15"), NaiveTime::from_hms_opt(8, 15, 0));
        assert!(parse_time("quarter past eight").is_none());
    }

    #[test]
    fn test_serde() {
        let key = MonthKey::new(2024, 7).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"July 2024\"");
        let back: MonthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
