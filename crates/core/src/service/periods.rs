//! Period locking.

use chrono::NaiveDate;
use tracing::info;

use moobaan_shared::types::{Money, PeriodSnapshotId, UserId};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::period::{
    PeriodLockGuard, PeriodService, PeriodSnapshot, PeriodTotals, PeriodUnlockLog, YearMonth,
};
use crate::store::{BillingStore, PeriodAccess, UnitOfWork};

use super::{BillingService, guard_period};

impl<S: BillingStore, C: Clock> BillingService<S, C> {
    /// Locks a month, capturing its income and credit note totals.
    ///
    /// The month is held before the totals are read, so a posting into it
    /// either commits first and is counted, or is refused once the lock
    /// commits.
    ///
    /// # Errors
    /// * `Validation` for an invalid month
    /// * `InvalidState` if already locked
    /// * `Conflict` if another admin locked it, or a posting landed in it,
    ///   concurrently
    pub async fn lock_period(&self, year: i32, month: u32, locked_by: UserId) -> CoreResult<PeriodSnapshot> {
        let period = YearMonth::new(year, month)?;
        let offset = self.settings.offset;
        let mut uow = self.store.begin().await?;
        let existing = uow.hold_period(period, PeriodAccess::Lock).await?;

        let income: Money = uow
            .incomes_received_between(period.first_day()?, period.last_day()?)
            .await?
            .iter()
            .map(|i| i.amount)
            .sum();
        let from = offset.to_utc(period.first_day()?, 0, 0)?;
        let to = offset.to_utc(period.next()?.first_day()?, 0, 0)?;
        let credit_notes: Money = uow
            .credit_notes_issued_between(from, to)
            .await?
            .iter()
            .map(|n| n.amount)
            .sum();

        let snapshot = PeriodService::lock(
            existing.as_ref(),
            period,
            PeriodTotals {
                income,
                credit_notes,
            },
            locked_by,
            self.clock.now(),
        )?;
        uow.save_period_snapshot(&snapshot, existing.as_ref().map(|s| s.status))
            .await?;
        uow.commit().await?;

        info!(
            period = %period,
            income_total = %income,
            credit_note_total = %credit_notes,
            %locked_by,
            "period locked"
        );
        Ok(snapshot)
    }

    /// Unlocks a period and appends the audit entry.
    ///
    /// # Errors
    /// * `NotFound` if the snapshot does not exist
    /// * `Validation` for a blank reason
    /// * `InvalidState` if not locked
    pub async fn unlock_period(
        &self,
        id: PeriodSnapshotId,
        reason: &str,
        unlocked_by: UserId,
    ) -> CoreResult<(PeriodSnapshot, PeriodUnlockLog)> {
        let mut uow = self.store.begin().await?;
        let snapshot = uow
            .period_snapshot_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("period snapshot", id))?;
        let (unlocked, log) = PeriodService::unlock(&snapshot, reason, unlocked_by, self.clock.now())?;
        uow.save_period_snapshot(&unlocked, Some(snapshot.status)).await?;
        uow.insert_unlock_log(&log).await?;
        uow.commit().await?;

        info!(period = %snapshot.period, %unlocked_by, reason = %log.reason, "period unlocked");
        Ok((unlocked, log))
    }

    /// Returns true if `date` falls in a locked period.
    ///
    /// # Errors
    /// * `Storage`
    pub async fn is_period_locked(&self, date: NaiveDate) -> CoreResult<bool> {
        let mut uow = self.store.begin().await?;
        let snapshot = uow.period_snapshot(YearMonth::of(date)).await?;
        Ok(PeriodLockGuard::is_locked(snapshot.as_ref()))
    }

    /// Fails with `PeriodLocked` if `date` falls in a locked period.
    ///
    /// For collaborators such as expense recording that create dated
    /// records outside this crate.
    ///
    /// # Errors
    /// * `PeriodLocked`
    pub async fn assert_period_open(&self, date: NaiveDate, context: &str) -> CoreResult<()> {
        let mut uow = self.store.begin().await?;
        guard_period(&mut uow, date, context).await
    }

    /// Unlock history of a period, oldest first.
    ///
    /// # Errors
    /// * `Storage`
    pub async fn unlock_history(&self, id: PeriodSnapshotId) -> CoreResult<Vec<PeriodUnlockLog>> {
        let mut uow = self.store.begin().await?;
        uow.unlock_logs(id).await
    }
}
