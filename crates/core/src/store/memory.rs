//! In-memory store.
//!
//! A unit of work reads and writes a private copy of the state and records
//! each write in a log. Commit replays the log against the live state under
//! a lock, re-checking every constraint, so concurrent units of work behave
//! like serializable database transactions: the loser of a race fails at
//! commit with the same error the database would raise.
//!
//! Period holds are checked at commit instead of blocking: a post fails with
//! `PeriodLocked` if a lock of its month committed first, and a lock fails
//! with `Conflict` if a post into its month committed after it began.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use moobaan_shared::types::{
    BankTransactionId, CreditNoteId, HouseId, IncomeTransactionId, InvoiceId, MembershipId,
    Money, PayInId, PeriodSnapshotId, UnlockLogId,
};

use crate::bank::BankTransaction;
use crate::credit::{CreditNote, Invoice};
use crate::error::{CoreError, CoreResult};
use crate::house::{House, ResidentMembership};
use crate::ledger::IncomeTransaction;
use crate::payin::{PayIn, PayInStatus};
use crate::period::{PeriodSnapshot, PeriodStatus, PeriodUnlockLog, YearMonth};
use crate::store::{BillingStore, PeriodAccess, UnitOfWork};

/// Kinds of write a fault can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// `insert_house`
    InsertHouse,
    /// `insert_membership`
    InsertMembership,
    /// `insert_pay_in`
    InsertPayIn,
    /// `update_pay_in`
    UpdatePayIn,
    /// `insert_bank_transaction`
    InsertBankTransaction,
    /// `claim_bank_transaction`
    ClaimBankTransaction,
    /// `release_bank_transaction`
    ReleaseBankTransaction,
    /// `insert_income`
    InsertIncome,
    /// `insert_invoice`
    InsertInvoice,
    /// `insert_credit_note`
    InsertCreditNote,
    /// `save_period_snapshot`
    SavePeriodSnapshot,
    /// `insert_unlock_log`
    InsertUnlockLog,
}

/// A one-shot injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The next write of this kind fails with `Storage`.
    Write(WriteKind),
    /// The next commit fails with `Storage` and applies nothing.
    Commit,
}

#[derive(Debug, Clone)]
enum Write {
    InsertHouse(House),
    InsertMembership(ResidentMembership),
    InsertPayIn(PayIn),
    UpdatePayIn { pay_in: PayIn, status: PayInStatus, version: i32 },
    InsertBankTransaction(BankTransaction),
    ClaimBankTransaction { id: BankTransactionId, pay_in_id: PayInId },
    ReleaseBankTransaction { id: BankTransactionId, pay_in_id: PayInId },
    InsertIncome(IncomeTransaction),
    InsertInvoice(Invoice),
    InsertCreditNote(CreditNote),
    SavePeriodSnapshot { snapshot: PeriodSnapshot, expected: Option<PeriodStatus> },
    InsertUnlockLog(PeriodUnlockLog),
}

impl Write {
    const fn kind(&self) -> WriteKind {
        match self {
            Self::InsertHouse(_) => WriteKind::InsertHouse,
            Self::InsertMembership(_) => WriteKind::InsertMembership,
            Self::InsertPayIn(_) => WriteKind::InsertPayIn,
            Self::UpdatePayIn { .. } => WriteKind::UpdatePayIn,
            Self::InsertBankTransaction(_) => WriteKind::InsertBankTransaction,
            Self::ClaimBankTransaction { .. } => WriteKind::ClaimBankTransaction,
            Self::ReleaseBankTransaction { .. } => WriteKind::ReleaseBankTransaction,
            Self::InsertIncome(_) => WriteKind::InsertIncome,
            Self::InsertInvoice(_) => WriteKind::InsertInvoice,
            Self::InsertCreditNote(_) => WriteKind::InsertCreditNote,
            Self::SavePeriodSnapshot { .. } => WriteKind::SavePeriodSnapshot,
            Self::InsertUnlockLog(_) => WriteKind::InsertUnlockLog,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    houses: BTreeMap<HouseId, House>,
    memberships: BTreeMap<MembershipId, ResidentMembership>,
    pay_ins: BTreeMap<PayInId, PayIn>,
    bank_transactions: BTreeMap<BankTransactionId, BankTransaction>,
    incomes: BTreeMap<IncomeTransactionId, IncomeTransaction>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    credit_notes: BTreeMap<CreditNoteId, CreditNote>,
    snapshots: BTreeMap<PeriodSnapshotId, PeriodSnapshot>,
    unlock_logs: BTreeMap<UnlockLogId, PeriodUnlockLog>,
    /// Committed post holds per month.
    postings: BTreeMap<YearMonth, u64>,
}

fn duplicate_key(entity: &str, id: impl std::fmt::Display) -> CoreError {
    CoreError::Conflict(format!("{entity} {id} already exists"))
}

impl State {
    fn apply(&mut self, write: &Write) -> CoreResult<()> {
        match write {
            Write::InsertHouse(house) => {
                if self.houses.contains_key(&house.id) {
                    return Err(duplicate_key("house", house.id));
                }
                if self.houses.values().any(|h| h.code == house.code) {
                    return Err(duplicate_key("house code", &house.code));
                }
                self.houses.insert(house.id, house.clone());
            }
            Write::InsertMembership(membership) => {
                if !self.houses.contains_key(&membership.house_id) {
                    return Err(CoreError::not_found("house", membership.house_id));
                }
                if self.memberships.contains_key(&membership.id)
                    || self.memberships.values().any(|m| {
                        m.house_id == membership.house_id && m.user_id == membership.user_id
                    })
                {
                    return Err(duplicate_key("membership", membership.id));
                }
                self.memberships.insert(membership.id, membership.clone());
            }
            Write::InsertPayIn(pay_in) => {
                if !self.houses.contains_key(&pay_in.house_id) {
                    return Err(CoreError::not_found("house", pay_in.house_id));
                }
                if self.pay_ins.contains_key(&pay_in.id) {
                    return Err(duplicate_key("pay-in", pay_in.id));
                }
                self.check_pay_in_link(pay_in)?;
                self.pay_ins.insert(pay_in.id, pay_in.clone());
            }
            Write::UpdatePayIn { pay_in, status, version } => {
                let stored = self
                    .pay_ins
                    .get(&pay_in.id)
                    .ok_or_else(|| CoreError::not_found("pay-in", pay_in.id))?;
                if stored.status != *status || stored.version != *version {
                    return Err(CoreError::Conflict(format!(
                        "Pay-in {} is {} at version {}, expected {status} at version {version}",
                        pay_in.id, stored.status, stored.version
                    )));
                }
                self.check_pay_in_link(pay_in)?;
                self.pay_ins.insert(pay_in.id, pay_in.clone());
            }
            Write::InsertBankTransaction(txn) => {
                if self.bank_transactions.contains_key(&txn.id) {
                    return Err(duplicate_key("bank transaction", txn.id));
                }
                self.bank_transactions.insert(txn.id, txn.clone());
            }
            Write::ClaimBankTransaction { id, pay_in_id } => {
                let holder = self
                    .bank_transactions
                    .values()
                    .any(|t| t.id != *id && t.matched_pay_in_id == Some(*pay_in_id));
                let txn = self
                    .bank_transactions
                    .get_mut(id)
                    .ok_or_else(|| CoreError::not_found("bank transaction", id))?;
                if holder || txn.matched_pay_in_id.is_some() {
                    return Err(CoreError::AlreadyMatched {
                        pay_in_id: *pay_in_id,
                        bank_transaction_id: *id,
                    });
                }
                txn.matched_pay_in_id = Some(*pay_in_id);
            }
            Write::ReleaseBankTransaction { id, pay_in_id } => {
                let txn = self
                    .bank_transactions
                    .get_mut(id)
                    .ok_or_else(|| CoreError::not_found("bank transaction", id))?;
                if txn.matched_pay_in_id != Some(*pay_in_id) {
                    return Err(CoreError::Conflict(format!(
                        "Bank transaction {id} is not matched to pay-in {pay_in_id}"
                    )));
                }
                txn.matched_pay_in_id = None;
            }
            Write::InsertIncome(income) => {
                if !self.pay_ins.contains_key(&income.pay_in_id) {
                    return Err(CoreError::not_found("pay-in", income.pay_in_id));
                }
                if self.incomes.values().any(|i| i.pay_in_id == income.pay_in_id) {
                    return Err(CoreError::DuplicatePosting {
                        pay_in_id: income.pay_in_id,
                    });
                }
                if self.incomes.contains_key(&income.id) {
                    return Err(duplicate_key("income", income.id));
                }
                self.check_open(YearMonth::of(income.received_on), "post income")?;
                self.incomes.insert(income.id, income.clone());
            }
            Write::InsertInvoice(invoice) => {
                if !self.houses.contains_key(&invoice.house_id) {
                    return Err(CoreError::not_found("house", invoice.house_id));
                }
                if self.invoices.contains_key(&invoice.id) {
                    return Err(duplicate_key("invoice", invoice.id));
                }
                self.invoices.insert(invoice.id, invoice.clone());
            }
            Write::InsertCreditNote(note) => {
                let invoice = self
                    .invoices
                    .get(&note.invoice_id)
                    .ok_or_else(|| CoreError::not_found("invoice", note.invoice_id))?;
                if self.credit_notes.contains_key(&note.id) {
                    return Err(duplicate_key("credit note", note.id));
                }
                let credited: Money = self
                    .credit_notes
                    .values()
                    .filter(|n| n.invoice_id == note.invoice_id)
                    .map(|n| n.amount)
                    .sum();
                if credited + note.amount > invoice.total_amount {
                    return Err(CoreError::Conflict(format!(
                        "Invoice {} was credited concurrently",
                        note.invoice_id
                    )));
                }
                self.credit_notes.insert(note.id, note.clone());
            }
            Write::SavePeriodSnapshot { snapshot, expected } => {
                match expected {
                    None => {
                        if self.snapshots.contains_key(&snapshot.id)
                            || self.snapshots.values().any(|s| s.period == snapshot.period)
                        {
                            return Err(duplicate_key("period snapshot", snapshot.period));
                        }
                    }
                    Some(expected) => {
                        let stored = self
                            .snapshots
                            .get(&snapshot.id)
                            .ok_or_else(|| CoreError::not_found("period snapshot", snapshot.id))?;
                        if stored.status != *expected || stored.period != snapshot.period {
                            return Err(CoreError::Conflict(format!(
                                "Period {} is {}, expected {expected}",
                                stored.period, stored.status
                            )));
                        }
                    }
                }
                self.snapshots.insert(snapshot.id, snapshot.clone());
            }
            Write::InsertUnlockLog(log) => {
                if !self.snapshots.contains_key(&log.snapshot_id) {
                    return Err(CoreError::not_found("period snapshot", log.snapshot_id));
                }
                if self.unlock_logs.contains_key(&log.id) {
                    return Err(duplicate_key("unlock log", log.id));
                }
                self.unlock_logs.insert(log.id, log.clone());
            }
        }
        Ok(())
    }

    fn snapshot(&self, period: YearMonth) -> Option<&PeriodSnapshot> {
        self.snapshots.values().find(|s| s.period == period)
    }

    fn check_open(&self, period: YearMonth, context: &str) -> CoreResult<()> {
        match self.snapshot(period) {
            Some(snapshot) if snapshot.is_locked() => Err(CoreError::PeriodLocked {
                period: snapshot.label(),
                context: context.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn posting_count(&self, period: YearMonth) -> u64 {
        self.postings.get(&period).copied().unwrap_or_default()
    }

    /// Fails if `hold` was invalidated by a commit since it was taken.
    fn check_hold(&self, hold: &Hold) -> CoreResult<()> {
        match hold.access {
            PeriodAccess::Post => self.check_open(hold.period, "post into period"),
            PeriodAccess::Lock if self.posting_count(hold.period) != hold.postings_seen => {
                Err(CoreError::Conflict(format!(
                    "Period {} received postings while its snapshot was being changed",
                    hold.period
                )))
            }
            PeriodAccess::Lock => Ok(()),
        }
    }

    fn check_pay_in_link(&self, pay_in: &PayIn) -> CoreResult<()> {
        let Some(txn_id) = pay_in.matched_bank_transaction_id else {
            return Ok(());
        };
        if !self.bank_transactions.contains_key(&txn_id) {
            return Err(CoreError::not_found("bank transaction", txn_id));
        }
        let taken = self
            .pay_ins
            .values()
            .any(|p| p.id != pay_in.id && p.matched_bank_transaction_id == Some(txn_id));
        if taken {
            return Err(CoreError::AlreadyMatched {
                pay_in_id: pay_in.id,
                bank_transaction_id: txn_id,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Hold {
    period: YearMonth,
    access: PeriodAccess,
    postings_seen: u64,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    faults: Mutex<Vec<Fault>>,
}

fn lock<T>(mutex: &Mutex<T>) -> CoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| CoreError::Storage("in-memory store lock poisoned".to_string()))
}

impl Shared {
    fn take_fault(&self, fault: Fault) -> CoreResult<bool> {
        let mut faults = lock(&self.faults)?;
        match faults.iter().position(|f| *f == fault) {
            Some(index) => {
                faults.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Process-local store for tests and tooling.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure.
    pub fn inject(&self, fault: Fault) -> CoreResult<()> {
        lock(&self.shared.faults)?.push(fault);
        Ok(())
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    type Uow = InMemoryUnitOfWork;

    async fn begin(&self) -> CoreResult<Self::Uow> {
        let view = lock(&self.shared.state)?.clone();
        Ok(InMemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            view,
            log: Vec::new(),
            holds: Vec::new(),
        })
    }
}

/// Unit of work over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    view: State,
    log: Vec<Write>,
    holds: Vec<Hold>,
}

impl InMemoryUnitOfWork {
    fn write(&mut self, write: Write) -> CoreResult<()> {
        let kind = write.kind();
        if self.shared.take_fault(Fault::Write(kind))? {
            return Err(CoreError::Storage(format!("injected failure on {kind:?}")));
        }
        self.view.apply(&write)?;
        self.log.push(write);
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn house(&mut self, id: HouseId) -> CoreResult<Option<House>> {
        Ok(self.view.houses.get(&id).cloned())
    }

    async fn insert_house(&mut self, house: &House) -> CoreResult<()> {
        self.write(Write::InsertHouse(house.clone()))
    }

    async fn memberships_for_house(&mut self, house_id: HouseId) -> CoreResult<Vec<ResidentMembership>> {
        Ok(self
            .view
            .memberships
            .values()
            .filter(|m| m.house_id == house_id)
            .cloned()
            .collect())
    }

    async fn insert_membership(&mut self, membership: &ResidentMembership) -> CoreResult<()> {
        self.write(Write::InsertMembership(membership.clone()))
    }

    async fn pay_in(&mut self, id: PayInId) -> CoreResult<Option<PayIn>> {
        Ok(self.view.pay_ins.get(&id).cloned())
    }

    async fn open_pay_ins(&mut self) -> CoreResult<Vec<PayIn>> {
        Ok(self
            .view
            .pay_ins
            .values()
            .filter(|p| p.status.is_matchable() && p.matched_bank_transaction_id.is_none())
            .cloned()
            .collect())
    }

    async fn insert_pay_in(&mut self, pay_in: &PayIn) -> CoreResult<()> {
        self.write(Write::InsertPayIn(pay_in.clone()))
    }

    async fn update_pay_in(&mut self, pay_in: &PayIn, expected: &PayIn) -> CoreResult<()> {
        self.write(Write::UpdatePayIn {
            pay_in: pay_in.clone(),
            status: expected.status,
            version: expected.version,
        })
    }

    async fn bank_transaction(&mut self, id: BankTransactionId) -> CoreResult<Option<BankTransaction>> {
        Ok(self.view.bank_transactions.get(&id).cloned())
    }

    async fn unmatched_credits(&mut self) -> CoreResult<Vec<BankTransaction>> {
        Ok(self
            .view
            .bank_transactions
            .values()
            .filter(|t| t.is_match_candidate())
            .cloned()
            .collect())
    }

    async fn insert_bank_transaction(&mut self, transaction: &BankTransaction) -> CoreResult<()> {
        self.write(Write::InsertBankTransaction(transaction.clone()))
    }

    async fn claim_bank_transaction(
        &mut self,
        id: BankTransactionId,
        pay_in_id: PayInId,
    ) -> CoreResult<()> {
        self.write(Write::ClaimBankTransaction { id, pay_in_id })
    }

    async fn release_bank_transaction(
        &mut self,
        id: BankTransactionId,
        pay_in_id: PayInId,
    ) -> CoreResult<()> {
        self.write(Write::ReleaseBankTransaction { id, pay_in_id })
    }

    async fn incomes_for_pay_in(&mut self, pay_in_id: PayInId) -> CoreResult<Vec<IncomeTransaction>> {
        Ok(self
            .view
            .incomes
            .values()
            .filter(|i| i.pay_in_id == pay_in_id)
            .cloned()
            .collect())
    }

    async fn incomes_received_between(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CoreResult<Vec<IncomeTransaction>> {
        Ok(self
            .view
            .incomes
            .values()
            .filter(|i| i.received_on >= from && i.received_on <= to)
            .cloned()
            .collect())
    }

    async fn insert_income(&mut self, income: &IncomeTransaction) -> CoreResult<()> {
        self.write(Write::InsertIncome(income.clone()))
    }

    async fn invoice(&mut self, id: InvoiceId) -> CoreResult<Option<Invoice>> {
        Ok(self.view.invoices.get(&id).cloned())
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> CoreResult<()> {
        self.write(Write::InsertInvoice(invoice.clone()))
    }

    async fn credit_notes_for_invoice(&mut self, invoice_id: InvoiceId) -> CoreResult<Vec<CreditNote>> {
        Ok(self
            .view
            .credit_notes
            .values()
            .filter(|n| n.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn insert_credit_note(&mut self, note: &CreditNote) -> CoreResult<()> {
        self.write(Write::InsertCreditNote(note.clone()))
    }

    async fn credit_notes_issued_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<CreditNote>> {
        Ok(self
            .view
            .credit_notes
            .values()
            .filter(|n| n.issued_at >= from && n.issued_at < to)
            .cloned()
            .collect())
    }

    async fn hold_period(
        &mut self,
        period: YearMonth,
        access: PeriodAccess,
    ) -> CoreResult<Option<PeriodSnapshot>> {
        self.holds.push(Hold {
            period,
            access,
            postings_seen: self.view.posting_count(period),
        });
        Ok(self.view.snapshot(period).cloned())
    }

    async fn period_snapshot(&mut self, period: YearMonth) -> CoreResult<Option<PeriodSnapshot>> {
        Ok(self.view.snapshot(period).cloned())
    }

    async fn period_snapshot_by_id(&mut self, id: PeriodSnapshotId) -> CoreResult<Option<PeriodSnapshot>> {
        Ok(self.view.snapshots.get(&id).cloned())
    }

    async fn save_period_snapshot(
        &mut self,
        snapshot: &PeriodSnapshot,
        expected: Option<PeriodStatus>,
    ) -> CoreResult<()> {
        self.write(Write::SavePeriodSnapshot {
            snapshot: snapshot.clone(),
            expected,
        })
    }

    async fn insert_unlock_log(&mut self, log: &PeriodUnlockLog) -> CoreResult<()> {
        self.write(Write::InsertUnlockLog(log.clone()))
    }

    async fn unlock_logs(&mut self, snapshot_id: PeriodSnapshotId) -> CoreResult<Vec<PeriodUnlockLog>> {
        let mut logs: Vec<_> = self
            .view
            .unlock_logs
            .values()
            .filter(|l| l.snapshot_id == snapshot_id)
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.unlocked_at, l.id));
        Ok(logs)
    }

    async fn commit(self) -> CoreResult<()> {
        if self.shared.take_fault(Fault::Commit)? {
            return Err(CoreError::Storage("injected commit failure".to_string()));
        }
        let mut live = lock(&self.shared.state)?;
        let mut next = live.clone();
        for hold in &self.holds {
            next.check_hold(hold)?;
        }
        for write in &self.log {
            next.apply(write)?;
        }
        for hold in self.holds.iter().filter(|h| h.access == PeriodAccess::Post) {
            *next.postings.entry(hold.period).or_default() += 1;
        }
        *live = next;
        Ok(())
    }
}
