//! Billing service.
//!
//! Each public operation opens one unit of work, applies the pure rules of
//! the domain modules to what it reads, writes the result, and commits. An
//! operation that fails at any step commits nothing.

use chrono::{Duration, NaiveDate};
use tracing::debug;

use moobaan_shared::AppConfig;
use moobaan_shared::types::{BankTransactionId, PayInId, RegionalOffset};

use crate::bank::BankTransaction;
use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, CoreResult};
use crate::matching::{DEFAULT_TOLERANCE_SECS, Matcher};
use crate::payin::PayIn;
use crate::period::{PeriodLockGuard, YearMonth};
use crate::store::{BillingStore, PeriodAccess, UnitOfWork};

mod invoices;
mod matching;
mod payins;
mod periods;

#[cfg(test)]
mod matching_props;
#[cfg(test)]
mod tests;

pub use matching::MatchRunReport;
pub use payins::AcceptOutcome;

/// Reconciliation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationSettings {
    /// Inclusive automatic-match window.
    pub tolerance: Duration,
    /// Offset for naive local timestamps.
    pub offset: RegionalOffset,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            tolerance: Duration::seconds(i64::from(DEFAULT_TOLERANCE_SECS)),
            offset: RegionalOffset::default(),
        }
    }
}

impl ReconciliationSettings {
    /// Builds settings from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tolerance: Duration::seconds(i64::from(config.matching.tolerance_secs)),
            offset: config.regional.utc_offset_hours,
        }
    }

    /// Matcher configured with this tolerance.
    #[must_use]
    pub const fn matcher(&self) -> Matcher {
        Matcher::new(self.tolerance)
    }
}

/// Entry point for every billing operation.
#[derive(Debug, Clone)]
pub struct BillingService<S, C = SystemClock> {
    store: S,
    clock: C,
    settings: ReconciliationSettings,
}

impl<S: BillingStore, C: Clock> BillingService<S, C> {
    /// Creates a service over a store and clock.
    #[must_use]
    pub const fn new(store: S, clock: C, settings: ReconciliationSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> ReconciliationSettings {
        self.settings
    }
}

async fn require_pay_in<U: UnitOfWork>(uow: &mut U, id: PayInId) -> CoreResult<PayIn> {
    uow.pay_in(id)
        .await?
        .ok_or_else(|| CoreError::not_found("pay-in", id))
}

async fn require_bank_transaction<U: UnitOfWork>(
    uow: &mut U,
    id: BankTransactionId,
) -> CoreResult<BankTransaction> {
    uow.bank_transaction(id)
        .await?
        .ok_or_else(|| CoreError::not_found("bank transaction", id))
}

/// Holds the period of `date` for posting and fails if it is locked.
///
/// The hold lasts until `uow` ends, so a lock of the same month either
/// commits first (and this fails) or waits for `uow`.
async fn guard_period<U: UnitOfWork>(uow: &mut U, date: NaiveDate, context: &str) -> CoreResult<()> {
    let snapshot = uow.hold_period(YearMonth::of(date), PeriodAccess::Post).await?;
    debug!(%date, locked = PeriodLockGuard::is_locked(snapshot.as_ref()), "period check");
    PeriodLockGuard::assert_not_locked(date, snapshot.as_ref(), context)
}
