//! Bank import and reconciliation.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Timelike, Utc};
use tracing::info;

use moobaan_shared::types::{BankTransactionId, HouseId, PayInId, UserId};

use crate::bank::{BankStatementRow, BankTransaction};
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::matching::MatchProposal;
use crate::payin::{ClaimedTransfer, NewPayIn, PayIn, PayInService, PayInSource, PayInStatus};
use crate::store::{BillingStore, UnitOfWork};

use super::{BillingService, require_bank_transaction, require_pay_in};

/// Result of one automatic matching pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchRunReport {
    /// Links committed by this run.
    pub matched: Vec<MatchProposal>,
    /// Open pay-ins left for manual reconciliation.
    pub unmatched_pay_ins: Vec<PayInId>,
}

/// Names a lost pay-in compare-and-set after re-reading the row.
///
/// If the pay-in now holds a link, another writer matched it first
/// (`AlreadyMatched`). Any other change, such as an edit, stays `Conflict`.
fn classify_link_conflict(
    err: CoreError,
    current: Option<&PayIn>,
    bank_transaction_id: BankTransactionId,
) -> CoreError {
    match (err, current) {
        (CoreError::Conflict(_), Some(current)) if current.matched_bank_transaction_id.is_some() => {
            CoreError::AlreadyMatched {
                pay_in_id: current.id,
                bank_transaction_id,
            }
        }
        (err, _) => err,
    }
}

/// Links both sides inside `uow` and returns the matched pay-in.
pub(super) async fn link<U: UnitOfWork>(
    uow: &mut U,
    pay_in: &PayIn,
    transaction: &BankTransaction,
    matched_by: Option<UserId>,
    now: DateTime<Utc>,
) -> CoreResult<PayIn> {
    let matched = PayInService::link(pay_in, transaction, matched_by, now)?;
    if let Err(err) = uow.update_pay_in(&matched, pay_in).await {
        let current = uow.pay_in(pay_in.id).await?;
        return Err(classify_link_conflict(err, current.as_ref(), transaction.id));
    }
    uow.claim_bank_transaction(transaction.id, pay_in.id).await?;
    Ok(matched)
}

impl<S: BillingStore, C: Clock> BillingService<S, C> {
    /// Normalizes and stores one bank statement row.
    ///
    /// # Errors
    /// * `Validation` for a malformed row
    pub async fn import_bank_transaction(&self, row: BankStatementRow) -> CoreResult<BankTransaction> {
        let transaction = BankTransaction::import(row, self.settings.offset, self.clock.now())?;
        let mut uow = self.store.begin().await?;
        uow.insert_bank_transaction(&transaction).await?;
        uow.commit().await?;
        info!(
            bank_transaction_id = %transaction.id,
            effective_at = %transaction.effective_at,
            credit = ?transaction.credit,
            debit = ?transaction.debit,
            "bank transaction imported"
        );
        Ok(transaction)
    }

    /// Creates an admin pay-in from an unmatched credit and links the two.
    ///
    /// # Errors
    /// * `NotFound` for a missing transaction or house
    /// * `Validation` for a debit row or an inactive house
    /// * `AlreadyMatched` if the transaction is already linked
    pub async fn create_pay_in_from_bank_transaction(
        &self,
        bank_transaction_id: BankTransactionId,
        house_id: HouseId,
        created_by: UserId,
    ) -> CoreResult<PayIn> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let transaction = require_bank_transaction(&mut uow, bank_transaction_id).await?;
        let amount = transaction.credit_amount().ok_or_else(|| {
            CoreError::Validation(format!(
                "Bank transaction {bank_transaction_id} is not a credit"
            ))
        })?;
        if let Some(pay_in_id) = transaction.matched_pay_in_id {
            return Err(CoreError::AlreadyMatched {
                pay_in_id,
                bank_transaction_id,
            });
        }
        let house = uow
            .house(house_id)
            .await?
            .ok_or_else(|| CoreError::not_found("house", house_id))?;
        house.ensure_active()?;

        let local = self.settings.offset.to_local(transaction.effective_at);
        let created = PayInService::create(
            NewPayIn {
                house_id,
                amount: amount.amount(),
                claimed: ClaimedTransfer::new(local.date(), local.hour(), local.minute()),
                source: PayInSource::AdminCreated,
                created_by,
                submit_immediately: true,
            },
            self.settings.offset,
            now,
        )?;
        uow.insert_pay_in(&created).await?;
        let matched = link(&mut uow, &created, &transaction, Some(created_by), now).await?;
        uow.commit().await?;

        info!(
            pay_in_id = %matched.id,
            %bank_transaction_id,
            %house_id,
            "pay-in created from bank transaction"
        );
        Ok(matched)
    }

    /// Runs the automatic matcher over every open pay-in and free credit.
    ///
    /// All links commit together. If a concurrent writer took or changed any
    /// record the whole run fails and may simply be re-run.
    ///
    /// # Errors
    /// * `AlreadyMatched` or `Conflict` on a lost race
    pub async fn run_automatic_match(&self) -> CoreResult<MatchRunReport> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let pay_ins = uow.open_pay_ins().await?;
        let transactions = uow.unmatched_credits().await?;

        let proposals = self.settings.matcher().propose(&pay_ins, &transactions);

        let pay_in_index: BTreeMap<_, _> = pay_ins.iter().map(|p| (p.id, p)).collect();
        let txn_index: BTreeMap<_, _> = transactions.iter().map(|t| (t.id, t)).collect();
        for proposal in &proposals {
            let (Some(pay_in), Some(transaction)) = (
                pay_in_index.get(&proposal.pay_in_id),
                txn_index.get(&proposal.bank_transaction_id),
            ) else {
                return Err(CoreError::integrity(format!(
                    "Matcher proposed unknown pair {} / {}",
                    proposal.pay_in_id, proposal.bank_transaction_id
                )));
            };
            link(&mut uow, pay_in, transaction, None, now).await?;
        }
        uow.commit().await?;

        let linked: HashSet<_> = proposals.iter().map(|p| p.pay_in_id).collect();
        let unmatched_pay_ins: Vec<_> = pay_ins
            .iter()
            .map(|p| p.id)
            .filter(|id| !linked.contains(id))
            .collect();

        info!(
            candidates = pay_ins.len(),
            credits = transactions.len(),
            matched = proposals.len(),
            unmatched = unmatched_pay_ins.len(),
            "automatic match run finished"
        );
        Ok(MatchRunReport {
            matched: proposals,
            unmatched_pay_ins,
        })
    }

    /// Links a pay-in to a credit regardless of amount and time, recording
    /// the admin on the pay-in.
    ///
    /// # Errors
    /// * `NotFound` for either record
    /// * `AlreadyMatched` if either side is linked
    /// * `Conflict` if the pay-in changed concurrently
    /// * `InvalidState` / `ImmutableRecord` for an ineligible pay-in
    /// * `Validation` for a debit row
    pub async fn manual_match(
        &self,
        pay_in_id: PayInId,
        bank_transaction_id: BankTransactionId,
        matched_by: UserId,
    ) -> CoreResult<PayIn> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let pay_in = require_pay_in(&mut uow, pay_in_id).await?;
        let transaction = require_bank_transaction(&mut uow, bank_transaction_id).await?;
        let matched = link(&mut uow, &pay_in, &transaction, Some(matched_by), now).await?;
        if let Err(err) = uow.commit().await {
            let mut reread = self.store.begin().await?;
            let current = reread.pay_in(pay_in_id).await?;
            return Err(classify_link_conflict(err, current.as_ref(), bank_transaction_id));
        }

        info!(%pay_in_id, %bank_transaction_id, %matched_by, "manual match");
        Ok(matched)
    }

    /// Removes the match held by a bank transaction.
    ///
    /// # Errors
    /// * `NotFound` if the transaction does not exist
    /// * `InvalidState` if it holds no match
    /// * `ImmutableRecord` if the linked pay-in is accepted
    /// * `DataIntegrity` if the linked pay-in does not link back as MATCHED
    pub async fn manual_unmatch(
        &self,
        bank_transaction_id: BankTransactionId,
        unmatched_by: UserId,
    ) -> CoreResult<PayIn> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let transaction = require_bank_transaction(&mut uow, bank_transaction_id).await?;
        let pay_in_id = transaction.matched_pay_in_id.ok_or_else(|| {
            CoreError::invalid_state("bank transaction", "unmatch", "UNMATCHED")
        })?;
        let pay_in = uow.pay_in(pay_in_id).await?.ok_or_else(|| {
            CoreError::integrity(format!(
                "Bank transaction {bank_transaction_id} links missing pay-in {pay_in_id}"
            ))
        })?;
        if pay_in.status == PayInStatus::Accepted {
            return Err(CoreError::ImmutableRecord {
                record: format!("Accepted pay-in {pay_in_id}"),
            });
        }
        if pay_in.status != PayInStatus::Matched
            || pay_in.matched_bank_transaction_id != Some(bank_transaction_id)
        {
            return Err(CoreError::integrity(format!(
                "Bank transaction {bank_transaction_id} links pay-in {pay_in_id}, which is {} with link {:?}",
                pay_in.status, pay_in.matched_bank_transaction_id
            )));
        }

        let unmatched = PayInService::unlink(&pay_in, now)?;
        uow.update_pay_in(&unmatched, &pay_in).await?;
        uow.release_bank_transaction(bank_transaction_id, pay_in_id).await?;
        uow.commit().await?;

        info!(%pay_in_id, %bank_transaction_id, %unmatched_by, "manual unmatch");
        Ok(unmatched)
    }

    /// Loads a bank transaction.
    ///
    /// # Errors
    /// * `NotFound`
    pub async fn bank_transaction(&self, id: BankTransactionId) -> CoreResult<BankTransaction> {
        let mut uow = self.store.begin().await?;
        require_bank_transaction(&mut uow, id).await
    }
}
