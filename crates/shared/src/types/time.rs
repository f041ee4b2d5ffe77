//! Regional wall-clock handling.
//!
//! Residents report transfer times as naive local wall-clock values
//! (a date plus hour and minute). Those values are only ever turned into
//! UTC instants through [`RegionalOffset::to_utc`]; every ingestion path
//! (resident submission, admin entry, LINE message, bank statement import)
//! goes through it.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default regional offset in hours (Asia/Bangkok, no daylight saving).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

const SECONDS_PER_HOUR: i32 = 3600;

/// Errors raised by regional time conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// Offset outside the range of real-world time zones.
    #[error("UTC offset of {0} hours is out of range")]
    InvalidOffset(i32),

    /// Hour or minute outside a valid wall-clock time.
    #[error("Invalid wall-clock time {hour:02}:{minute:02}")]
    InvalidTime {
        /// Reported hour.
        hour: u32,
        /// Reported minute.
        minute: u32,
    },
}

/// A fixed regional UTC offset used to interpret naive local timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct RegionalOffset {
    hours: i32,
}

impl RegionalOffset {
    /// Creates an offset of whole hours east of UTC.
    pub fn from_hours(hours: i32) -> Result<Self, TimeError> {
        if !(-12..=14).contains(&hours) {
            return Err(TimeError::InvalidOffset(hours));
        }
        Ok(Self { hours })
    }

    /// The offset in whole hours.
    #[must_use]
    pub const fn hours(&self) -> i32 {
        self.hours
    }

    /// The offset as a chrono `FixedOffset`.
    #[must_use]
    pub fn fixed(&self) -> FixedOffset {
        FixedOffset::east_opt(self.hours * SECONDS_PER_HOUR)
            .expect("offset hours are range-checked on construction")
    }

    /// Converts a local date and hour:minute into a UTC instant.
    pub fn to_utc(&self, date: NaiveDate, hour: u32, minute: u32) -> Result<DateTime<Utc>, TimeError> {
        let time =
            NaiveTime::from_hms_opt(hour, minute, 0).ok_or(TimeError::InvalidTime { hour, minute })?;
        self.to_utc_naive(date.and_time(time))
    }

    /// Converts a full naive local timestamp into a UTC instant.
    ///
    /// Seconds are preserved; this is the path bank statement rows take.
    pub fn to_utc_naive(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, TimeError> {
        // A fixed offset has no gaps or folds, so the mapping is always single.
        self.fixed()
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or(TimeError::InvalidTime {
                hour: local.hour(),
                minute: local.minute(),
            })
    }

    /// Returns the regional wall-clock time of a UTC instant.
    #[must_use]
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.fixed()).naive_local()
    }

    /// Returns the regional calendar date of a UTC instant.
    #[must_use]
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date()
    }

    /// Returns `(year, month)` of the regional calendar date of an instant.
    #[must_use]
    pub fn local_year_month(&self, instant: DateTime<Utc>) -> (i32, u32) {
        let date = self.local_date(instant);
        (date.year(), date.month())
    }
}

impl Default for RegionalOffset {
    fn default() -> Self {
        Self {
            hours: DEFAULT_UTC_OFFSET_HOURS,
        }
    }
}

impl TryFrom<i32> for RegionalOffset {
    type Error = TimeError;

    fn try_from(hours: i32) -> Result<Self, Self::Error> {
        Self::from_hours(hours)
    }
}

impl From<RegionalOffset> for i32 {
    fn from(offset: RegionalOffset) -> Self {
        offset.hours
    }
}
