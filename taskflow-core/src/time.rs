//! Calendar math: local "today", week boundaries and the upcoming window.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

/// Days covered by the upcoming window past its first day (current week + next week).
pub const UPCOMING_WINDOW_DAYS: u64 = 13;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid day '{input}': {source}")]
    InvalidDay {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid weekday: {0}")]
    InvalidWeekday(String),
}

pub fn parse_timezone(tz: &str) -> Result<Tz, TimeError> {
    tz.parse().map_err(|_| TimeError::InvalidTimezone(tz.to_string()))
}

/// Calendar day in `tz` at instant `now`.
pub fn local_day(now: DateTime<Utc>, tz: &str) -> Result<NaiveDate, TimeError> {
    Ok(day_in_zone(now, parse_timezone(tz)?))
}

pub fn day_in_zone(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Today's calendar day in an IANA zone like "America/Chicago".
pub fn today_in(tz: &str) -> Result<NaiveDate, TimeError> {
    local_day(Utc::now(), tz)
}

/// Today's calendar day in an already parsed zone.
pub fn today_in_zone(tz: Tz) -> NaiveDate {
    day_in_zone(Utc::now(), tz)
}

pub fn parse_day(input: &str) -> Result<NaiveDate, TimeError> {
    NaiveDate::parse_from_str(input.trim(), DAY_FORMAT).map_err(|source| TimeError::InvalidDay {
        input: input.to_string(),
        source,
    })
}

/// `YYYY-MM-DD`, the form the counts endpoint expects.
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Accepts "monday", "Mon", "sunday", ...
pub fn parse_weekday(input: &str) -> Result<Weekday, TimeError> {
    input
        .trim()
        .parse::<Weekday>()
        .map_err(|_| TimeError::InvalidWeekday(input.to_string()))
}

pub fn start_of_week(day: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = (7 + day.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
    day - Days::new(u64::from(offset))
}

/// Inclusive `[start_of_week(today), start_of_week(today) + 13]`.
pub fn upcoming_window(today: NaiveDate, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    let start = start_of_week(today, week_start);
    (start, start + Days::new(UPCOMING_WINDOW_DAYS))
}
