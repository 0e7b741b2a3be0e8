//! Monthly period generation

use crate::error::{Error, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Wire format of every date accepted on input
const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive date range inside one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    /// First day of the period
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive)
    pub end_date: NaiveDate,
}

impl Period {
    /// Create a new period
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_date, self.end_date)
    }
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), INPUT_DATE_FORMAT)
        .map_err(|_| Error::invalid_date(value))
}

/// Split `start..=end` into calendar-month periods
///
/// The first period begins on the first day of `start`'s month; the last one
/// is clipped to `end`. Returns an empty list when `start > end`.
pub fn generate_periods(start: &str, end: &str) -> Result<Vec<Period>> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    Ok(generate_periods_between(start, end))
}

/// Typed form of [`generate_periods`]
pub fn generate_periods_between(start: NaiveDate, end: NaiveDate) -> Vec<Period> {
    let mut periods = Vec::new();
    if start > end {
        return periods;
    }

    let mut current = month_start(start);
    while current <= end {
        let next = current.checked_add_months(Months::new(1));
        let month_end = next
            .and_then(|n| n.pred_opt())
            .unwrap_or(NaiveDate::MAX);

        periods.push(Period::new(current, month_end.min(end)));

        match next {
            Some(n) => current = n,
            None => break,
        }
    }

    periods
}

fn month_start(date: NaiveDate) -> NaiveDate {
    // day 1 exists in every month
    date.with_day(1).unwrap_or(date)
}
