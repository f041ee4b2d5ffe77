//! Period snapshot types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use moobaan_shared::types::{Money, PeriodSnapshotId, UnlockLogId, UserId};

use crate::error::CoreError;

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Creates a year-month, validating the month number.
    pub fn new(year: i32, month: u32) -> Result<Self, CoreError> {
        if !(1..=12).contains(&month) {
            return Err(CoreError::Validation(format!(
                "Month must be between 1 and 12, got {month}"
            )));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CoreError::Validation(format!("Year {year} is out of range")));
        }
        Ok(Self { year, month })
    }

    /// The month a date falls in.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month number (1-12).
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Human-readable label, e.g. "2026-01".
    #[must_use]
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Returns true if the date falls in this month.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    /// First day of the month.
    ///
    /// # Errors
    /// * `Validation` if the month lies outside the supported calendar
    pub fn first_day(&self) -> Result<NaiveDate, CoreError> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).ok_or_else(|| self.out_of_range())
    }

    /// Last day of the month.
    ///
    /// # Errors
    /// * `Validation` if the month lies outside the supported calendar
    pub fn last_day(&self) -> Result<NaiveDate, CoreError> {
        self.next()?
            .first_day()?
            .pred_opt()
            .ok_or_else(|| self.out_of_range())
    }

    /// The following month.
    ///
    /// # Errors
    /// * `Validation` if there is no following month in the supported calendar
    pub fn next(&self) -> Result<Self, CoreError> {
        let next = if self.month == 12 {
            Self {
                year: self.year.checked_add(1).ok_or_else(|| self.out_of_range())?,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        };
        next.first_day()?;
        Ok(next)
    }

    fn out_of_range(&self) -> CoreError {
        CoreError::Validation(format!("Period {self} is outside the supported calendar"))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Status of a period snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    /// Period is open for financial mutations.
    Draft,
    /// Period is frozen.
    Locked,
}

impl PeriodStatus {
    /// Returns the string representation stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Locked => "LOCKED",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "LOCKED" => Some(Self::Locked),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per month, frozen when locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    /// Unique identifier.
    pub id: PeriodSnapshotId,
    /// The month covered.
    pub period: YearMonth,
    /// Current status.
    pub status: PeriodStatus,
    /// Sum of income received in the month, captured at lock time.
    pub income_total: Money,
    /// Sum of credit notes issued in the month, captured at lock time.
    pub credit_note_total: Money,
    /// When the period was last locked.
    pub locked_at: Option<DateTime<Utc>>,
    /// Who last locked the period.
    pub locked_by: Option<UserId>,
    /// When the snapshot was first created.
    pub created_at: DateTime<Utc>,
}

impl PeriodSnapshot {
    /// Returns true if the period is frozen.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == PeriodStatus::Locked
    }

    /// Human-readable label, e.g. "2026-01".
    #[must_use]
    pub fn label(&self) -> String {
        self.period.label()
    }
}

/// Append-only audit entry written on unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodUnlockLog {
    /// Unique identifier.
    pub id: UnlockLogId,
    /// Snapshot that was unlocked.
    pub snapshot_id: PeriodSnapshotId,
    /// Status before unlocking.
    pub previous_status: PeriodStatus,
    /// Mandatory justification.
    pub reason: String,
    /// Acting user.
    pub unlocked_by: UserId,
    /// When it happened.
    pub unlocked_at: DateTime<Utc>,
}
