//! Recurrence: rolling a repeating task's due date forward.
//!
//! Month and year steps use chrono's calendar arithmetic, which clamps to the
//! last day of the target month (Jan 31 + 1 month = Feb 28/29).

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stored value for "does not repeat".
pub const REPEAT_NONE: &str = "none";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("unknown repeat frequency: '{0}'")]
    UnknownFrequency(String),

    #[error("next occurrence of {date} ({frequency}) is out of the supported date range")]
    OutOfRange { date: NaiveDate, frequency: Frequency },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "every day")]
    Day,
    #[serde(rename = "every week")]
    Week,
    #[serde(rename = "every month")]
    Month,
    #[serde(rename = "every year")]
    Year,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Day => "every day",
            Frequency::Week => "every week",
            Frequency::Month => "every month",
            Frequency::Year => "every year",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "every day" => Ok(Frequency::Day),
            "every week" => Ok(Frequency::Week),
            "every month" => Ok(Frequency::Month),
            "every year" => Ok(Frequency::Year),
            other => Err(RecurrenceError::UnknownFrequency(other.to_string())),
        }
    }
}

/// Interpret a task's raw `repeat` field. Absent, empty or "none" means no recurrence.
pub fn parse_repeat(raw: Option<&str>) -> Result<Option<Frequency>, RecurrenceError> {
    match raw.map(str::trim) {
        None | Some("") | Some(REPEAT_NONE) => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

pub fn advance(date: NaiveDate, frequency: Frequency) -> Result<NaiveDate, RecurrenceError> {
    let next = match frequency {
        Frequency::Day => date.checked_add_days(Days::new(1)),
        Frequency::Week => date.checked_add_days(Days::new(7)),
        Frequency::Month => date.checked_add_months(Months::new(1)),
        Frequency::Year => date.checked_add_months(Months::new(12)),
    };
    next.ok_or(RecurrenceError::OutOfRange { date, frequency })
}

/// `advance` keyed by the stored frequency string.
pub fn next_due_date(date: NaiveDate, frequency: &str) -> Result<NaiveDate, RecurrenceError> {
    advance(date, frequency.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn steps_by_frequency() {
        assert_eq!(next_due_date(d(2025, 1, 10), "every day").unwrap(), d(2025, 1, 11));
        assert_eq!(next_due_date(d(2025, 1, 10), "every week").unwrap(), d(2025, 1, 17));
        assert_eq!(next_due_date(d(2025, 1, 10), "every month").unwrap(), d(2025, 2, 10));
        assert_eq!(next_due_date(d(2025, 1, 10), "every year").unwrap(), d(2026, 1, 10));
        assert_eq!(next_due_date(d(2024, 12, 31), "every day").unwrap(), d(2025, 1, 1));
    }

    #[test]
    fn month_end_clamps_to_last_day() {
        assert_eq!(advance(d(2025, 1, 31), Frequency::Month).unwrap(), d(2025, 2, 28));
        assert_eq!(advance(d(2024, 1, 31), Frequency::Month).unwrap(), d(2024, 2, 29));
        assert_eq!(advance(d(2025, 3, 31), Frequency::Month).unwrap(), d(2025, 4, 30));
        assert_eq!(advance(d(2024, 2, 29), Frequency::Year).unwrap(), d(2025, 2, 28));
    }

    #[test]
    fn unknown_frequency_is_an_error() {
        assert_eq!(
            next_due_date(d(2025, 1, 10), "every fortnight"),
            Err(RecurrenceError::UnknownFrequency("every fortnight".to_string()))
        );
        assert!(matches!(parse_repeat(Some("daily")), Err(RecurrenceError::UnknownFrequency(_))));
    }

    #[test]
    fn none_and_missing_do_not_repeat() {
        assert_eq!(parse_repeat(None).unwrap(), None);
        assert_eq!(parse_repeat(Some("none")).unwrap(), None);
        assert_eq!(parse_repeat(Some("")).unwrap(), None);
        assert_eq!(parse_repeat(Some("every week")).unwrap(), Some(Frequency::Week));
    }

    #[test]
    fn end_of_calendar_is_out_of_range() {
        assert!(matches!(
            advance(NaiveDate::MAX, Frequency::Day),
            Err(RecurrenceError::OutOfRange { .. })
        ));
    }
}
