use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Month, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{PeriodError, Result};

/// A calendar month used as the filtering key for records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Creates a period, validating the month.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidPeriod(format!("{month}/{year}")));
        }
        Ok(Self { year, month })
    }

    /// The period containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Period::of(date) == *self
    }

    /// First day of the period.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn month_name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown")
    }
}

/// Formats as `"January 2025"`, the goal `monthYear` representation.
impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

/// Parses `"January 2025"` (month names are case-insensitive and may be
/// abbreviated).
impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PeriodError::InvalidPeriod(s.to_string());
        let mut parts = s.split_whitespace();
        let (Some(month), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let month = Month::from_str(month).map_err(|_| invalid())?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;

        Self::new(year, month.number_from_month())
    }
}

/// Parses an expense date in `"M/D/YYYY"` form.
pub fn parse_slash_date(s: &str) -> Result<NaiveDate> {
    let invalid = || PeriodError::InvalidDate(s.to_string());
    let parts: Vec<&str> = s.trim().split('/').collect();
    let [month, day, year] = parts.as_slice() else {
        return Err(invalid());
    };

    let month = month.trim().parse::<u32>().map_err(|_| invalid())?;
    let day = day.trim().parse::<u32>().map_err(|_| invalid())?;
    let year = year.trim().parse::<i32>().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Formats a date as `"M/D/YYYY"` without zero padding.
pub fn format_slash_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Parses an ISO-8601 timestamp (`"2025-01-15T10:00:00.000Z"`) or plain
/// date (`"2025-01-15"`) into its calendar date.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
        return Ok(timestamp.date_naive());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| PeriodError::InvalidDate(s.to_string()))
}

/// Formats a date as an ISO-8601 UTC midnight timestamp.
pub fn format_iso_date(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}
