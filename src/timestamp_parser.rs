//! Timestamp parsing and calendar-month arithmetic.
//!
//! All month boundaries are UTC. A [`CalendarMonth`] spans from its first
//! instant (`YYYY-MM-01T00:00:00Z`) to its last whole second
//! (`YYYY-MM-<last>T23:59:59Z`), which is how the backend reports `end_time`.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Handles parsing timestamps from the formats used in client-count payloads
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a timestamp string into a `DateTime<Utc>`.
    /// Accepts RFC3339 with `Z` or an explicit offset, and naive timestamps (assumed UTC).
    pub fn parse(timestamp_str: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp_str) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(naive.and_utc());
        }

        Err(Error::MalformedCounts {
            field: "timestamp".to_string(),
            reason: format!("failed to parse timestamp: {timestamp_str}"),
        })
    }

    /// The calendar month a month-block timestamp names.
    ///
    /// The date is read as written, before any offset is applied:
    /// `2023-09-01T00:00:00-07:00` is September even though the same instant
    /// would land elsewhere in another zone.
    pub fn parse_month(timestamp_str: &str) -> Result<CalendarMonth> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp_str) {
            return Ok(CalendarMonth::from_date(dt.naive_local().date()));
        }
        Self::parse(timestamp_str).map(CalendarMonth::containing)
    }
}

/// A UTC calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarMonth(NaiveDate);

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self::from_date(instant.date_naive())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_instant(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn last_instant(&self) -> DateTime<Utc> {
        self.add_months(1).first_instant() - Duration::seconds(1)
    }

    /// Shift by `n` months (negative goes back).
    pub fn add_months(&self, n: i32) -> Self {
        let index = self.year() * 12 + self.month() as i32 - 1 + n;
        let (year, month0) = (index.div_euclid(12), index.rem_euclid(12));
        Self::new(year, month0 as u32 + 1).unwrap_or(*self)
    }

    /// Chart axis label, e.g. `9/23`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.month(), self.0.format("%y"))
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl FromStr for CalendarMonth {
    type Err = chrono::ParseError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d").map(Self)
    }
}

impl Serialize for CalendarMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
