use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

/// A calendar month reporting window: `[start, end)` at first-of-month
/// boundaries, parsed from a `YYYY-MM` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    /// Parse a period token like "2024-03" into month boundaries.
    pub fn parse(token: &str) -> Result<Self, ParsePeriodError> {
        let (year_str, month_str) = token.split_once('-').ok_or(ParsePeriodError)?;
        if year_str.len() != 4 || month_str.len() != 2 {
            return Err(ParsePeriodError);
        }
        let year: i32 = year_str.parse().map_err(|_| ParsePeriodError)?;
        let month: u32 = month_str.parse().map_err(|_| ParsePeriodError)?;

        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or(ParsePeriodError)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(ParsePeriodError)?;

        let start = start.and_hms_opt(0, 0, 0).ok_or(ParsePeriodError)?;
        let end = end.and_hms_opt(0, 0, 0).ok_or(ParsePeriodError)?;
        Ok(Self {
            start: start.and_utc(),
            end: end.and_utc(),
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePeriodError;

impl fmt::Display for ParsePeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid period format, expected YYYY-MM")
    }
}

impl std::error::Error for ParsePeriodError {}
