//! Period lock guard and lock/unlock transitions.
//!
//! The guard is consulted by every path that creates a dated financial
//! record: income posting, invoice creation and credit notes.

use chrono::{DateTime, NaiveDate, Utc};

use moobaan_shared::types::{Money, PeriodSnapshotId, UnlockLogId, UserId};

use crate::error::CoreError;
use crate::period::types::{PeriodSnapshot, PeriodStatus, PeriodUnlockLog, YearMonth};

/// Checks dates against period snapshots.
pub struct PeriodLockGuard;

impl PeriodLockGuard {
    /// Returns true if the snapshot exists and is locked.
    #[must_use]
    pub fn is_locked(snapshot: Option<&PeriodSnapshot>) -> bool {
        snapshot.is_some_and(PeriodSnapshot::is_locked)
    }

    /// Fails with `PeriodLocked` if `date` falls in a locked period.
    ///
    /// `snapshot` is the snapshot stored for `date`'s month, if any.
    ///
    /// # Errors
    /// * `PeriodLocked` naming the period and the attempted action
    /// * `DataIntegrity` if the snapshot belongs to another month
    pub fn assert_not_locked(
        date: NaiveDate,
        snapshot: Option<&PeriodSnapshot>,
        context: &str,
    ) -> Result<(), CoreError> {
        let Some(snapshot) = snapshot else {
            return Ok(());
        };
        if !snapshot.period.contains(date) {
            return Err(CoreError::integrity(format!(
                "Snapshot {} consulted for date {date}",
                snapshot.label()
            )));
        }
        if snapshot.is_locked() {
            tracing::debug!(period = %snapshot.label(), context, "period lock refused mutation");
            return Err(CoreError::PeriodLocked {
                period: snapshot.label(),
                context: context.to_string(),
            });
        }
        Ok(())
    }
}

/// Totals captured when a period is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodTotals {
    /// Income received in the month.
    pub income: Money,
    /// Credit notes issued in the month.
    pub credit_notes: Money,
}

/// Stateless lock/unlock transitions.
pub struct PeriodService;

impl PeriodService {
    /// Locks a month, creating the snapshot or re-locking a draft one.
    ///
    /// # Errors
    /// * `InvalidState` if already locked
    /// * `DataIntegrity` if `existing` is for another month
    pub fn lock(
        existing: Option<&PeriodSnapshot>,
        period: YearMonth,
        totals: PeriodTotals,
        locked_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<PeriodSnapshot, CoreError> {
        let base = match existing {
            Some(snapshot) if snapshot.period != period => {
                return Err(CoreError::integrity(format!(
                    "Snapshot {} returned for period {period}",
                    snapshot.label()
                )));
            }
            Some(snapshot) if snapshot.is_locked() => {
                return Err(CoreError::invalid_state("period", "lock", snapshot.status));
            }
            Some(snapshot) => snapshot.clone(),
            None => PeriodSnapshot {
                id: PeriodSnapshotId::new(),
                period,
                status: PeriodStatus::Draft,
                income_total: Money::ZERO,
                credit_note_total: Money::ZERO,
                locked_at: None,
                locked_by: None,
                created_at: now,
            },
        };

        Ok(PeriodSnapshot {
            status: PeriodStatus::Locked,
            income_total: totals.income,
            credit_note_total: totals.credit_notes,
            locked_at: Some(now),
            locked_by: Some(locked_by),
            ..base
        })
    }

    /// Unlocks a locked period and produces the audit entry.
    ///
    /// # Errors
    /// * `Validation` if the reason is blank
    /// * `InvalidState` if not locked
    pub fn unlock(
        snapshot: &PeriodSnapshot,
        reason: &str,
        unlocked_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(PeriodSnapshot, PeriodUnlockLog), CoreError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::Validation("Unlock reason is required".to_string()));
        }
        if !snapshot.is_locked() {
            return Err(CoreError::invalid_state("period", "unlock", snapshot.status));
        }

        let log = PeriodUnlockLog {
            id: UnlockLogId::new(),
            snapshot_id: snapshot.id,
            previous_status: snapshot.status,
            reason: reason.to_string(),
            unlocked_by,
            unlocked_at: now,
        };
        let unlocked = PeriodSnapshot {
            status: PeriodStatus::Draft,
            ..snapshot.clone()
        };
        Ok((unlocked, log))
    }
}
