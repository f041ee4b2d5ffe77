//! Storage seam.
//!
//! Every core operation runs inside one [`UnitOfWork`]. Nothing is visible
//! to other units of work until [`UnitOfWork::commit`] succeeds; dropping
//! an uncommitted unit discards its writes.
//!
//! Implementations must enforce these constraints at the storage level, so
//! concurrent units of work cannot both pass an in-process check:
//!
//! * a bank transaction is the match of at most one pay-in, and vice versa
//! * a pay-in has at most one income row (`DuplicatePosting` otherwise)
//! * one period snapshot per (year, month)
//! * one membership per (user, house), one house per code
//! * compare-and-set on pay-in status and version, and on snapshot status
//!   (`Conflict`)
//! * no posting lands in a month whose lock committed first, and no lock
//!   commits totals that miss a posting committed first (see [`PeriodAccess`])

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use moobaan_shared::types::{
    BankTransactionId, HouseId, InvoiceId, PayInId, PeriodSnapshotId,
};

use crate::bank::BankTransaction;
use crate::credit::{CreditNote, Invoice};
use crate::error::CoreResult;
use crate::house::{House, ResidentMembership};
use crate::ledger::IncomeTransaction;
use crate::payin::PayIn;
use crate::period::{PeriodSnapshot, PeriodStatus, PeriodUnlockLog, YearMonth};

pub mod memory;

pub use memory::{Fault, InMemoryStore, WriteKind};

/// How a unit of work uses a month it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodAccess {
    /// Writes dated records into the month. Posts do not exclude each other.
    Post,
    /// Changes the month's snapshot. Excludes posts and other locks.
    Lock,
}

/// Source of units of work.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Unit of work type.
    type Uow: UnitOfWork;

    /// Opens a unit of work.
    async fn begin(&self) -> CoreResult<Self::Uow>;
}

/// Typed reads and writes scoped to one transaction.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Loads a house.
    async fn house(&mut self, id: HouseId) -> CoreResult<Option<House>>;

    /// Inserts a house.
    async fn insert_house(&mut self, house: &House) -> CoreResult<()>;

    /// All memberships of a house, any status.
    async fn memberships_for_house(&mut self, house_id: HouseId) -> CoreResult<Vec<ResidentMembership>>;

    /// Inserts a membership.
    async fn insert_membership(&mut self, membership: &ResidentMembership) -> CoreResult<()>;

    /// Loads a pay-in.
    async fn pay_in(&mut self, id: PayInId) -> CoreResult<Option<PayIn>>;

    /// Pay-ins eligible for automatic matching, ordered by id.
    async fn open_pay_ins(&mut self) -> CoreResult<Vec<PayIn>>;

    /// Inserts a pay-in.
    async fn insert_pay_in(&mut self, pay_in: &PayIn) -> CoreResult<()>;

    /// Overwrites a pay-in if the stored row still has the status and
    /// version of `expected`, the value it was derived from.
    ///
    /// Fails with `Conflict` if the row changed since it was read, and with
    /// `AlreadyMatched` if the new bank link is held by another pay-in.
    async fn update_pay_in(&mut self, pay_in: &PayIn, expected: &PayIn) -> CoreResult<()>;

    /// Loads a bank transaction.
    async fn bank_transaction(&mut self, id: BankTransactionId) -> CoreResult<Option<BankTransaction>>;

    /// Credits with no match, ordered by id.
    async fn unmatched_credits(&mut self) -> CoreResult<Vec<BankTransaction>>;

    /// Inserts a bank transaction.
    async fn insert_bank_transaction(&mut self, transaction: &BankTransaction) -> CoreResult<()>;

    /// Sets the transaction's back-reference if it is free.
    ///
    /// Fails with `AlreadyMatched` if the transaction already holds a match.
    async fn claim_bank_transaction(
        &mut self,
        id: BankTransactionId,
        pay_in_id: PayInId,
    ) -> CoreResult<()>;

    /// Clears the transaction's back-reference if it points at `pay_in_id`.
    ///
    /// Fails with `Conflict` otherwise.
    async fn release_bank_transaction(
        &mut self,
        id: BankTransactionId,
        pay_in_id: PayInId,
    ) -> CoreResult<()>;

    /// Income rows referencing a pay-in.
    async fn incomes_for_pay_in(&mut self, pay_in_id: PayInId) -> CoreResult<Vec<IncomeTransaction>>;

    /// Income rows received within `[from, to]`.
    async fn incomes_received_between(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CoreResult<Vec<IncomeTransaction>>;

    /// Inserts an income row; `DuplicatePosting` if the pay-in already has one.
    async fn insert_income(&mut self, income: &IncomeTransaction) -> CoreResult<()>;

    /// Loads an invoice, locking it against concurrent credit notes.
    async fn invoice(&mut self, id: InvoiceId) -> CoreResult<Option<Invoice>>;

    /// Inserts an invoice.
    async fn insert_invoice(&mut self, invoice: &Invoice) -> CoreResult<()>;

    /// Credit notes of an invoice in issue order.
    async fn credit_notes_for_invoice(&mut self, invoice_id: InvoiceId) -> CoreResult<Vec<CreditNote>>;

    /// Inserts a credit note.
    async fn insert_credit_note(&mut self, note: &CreditNote) -> CoreResult<()>;

    /// Credit notes issued within `[from, to)`.
    async fn credit_notes_issued_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<CreditNote>>;

    /// Holds a month until the unit of work ends and returns its snapshot.
    ///
    /// Must be called before reading anything the hold protects: a `Post`
    /// holder checks the lock status, a `Lock` holder reads the totals.
    async fn hold_period(
        &mut self,
        period: YearMonth,
        access: PeriodAccess,
    ) -> CoreResult<Option<PeriodSnapshot>>;

    /// Snapshot of a month.
    async fn period_snapshot(&mut self, period: YearMonth) -> CoreResult<Option<PeriodSnapshot>>;

    /// Snapshot by id.
    async fn period_snapshot_by_id(&mut self, id: PeriodSnapshotId) -> CoreResult<Option<PeriodSnapshot>>;

    /// Inserts (`expected` is `None`) or compare-and-sets a snapshot.
    async fn save_period_snapshot(
        &mut self,
        snapshot: &PeriodSnapshot,
        expected: Option<PeriodStatus>,
    ) -> CoreResult<()>;

    /// Appends an unlock audit entry.
    async fn insert_unlock_log(&mut self, log: &PeriodUnlockLog) -> CoreResult<()>;

    /// Unlock history of a snapshot, oldest first.
    async fn unlock_logs(&mut self, snapshot_id: PeriodSnapshotId) -> CoreResult<Vec<PeriodUnlockLog>>;

    /// Makes every write visible atomically.
    async fn commit(self) -> CoreResult<()>;
}
