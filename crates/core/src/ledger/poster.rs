//! Ledger poster.
//!
//! The poster decides what to write; the orchestrating service writes the
//! income row and flips the pay-in to ACCEPTED in one unit of work.

use chrono::{DateTime, NaiveDate, Utc};

use moobaan_shared::types::{IncomeTransactionId, PayInId, RegionalOffset, UserId};

use crate::bank::BankTransaction;
use crate::error::CoreError;
use crate::ledger::income::IncomeTransaction;
use crate::payin::PayIn;

/// Stateless posting rules.
pub struct LedgerPoster;

impl LedgerPoster {
    /// Effective received date of a pay-in.
    ///
    /// Matched pay-ins take the regional date of the bank transaction's
    /// effective instant; others take the claimed date.
    ///
    /// # Errors
    /// * `DataIntegrity` if the pay-in's link and the supplied transaction disagree
    pub fn received_date(
        pay_in: &PayIn,
        matched: Option<&BankTransaction>,
        offset: RegionalOffset,
    ) -> Result<NaiveDate, CoreError> {
        match (pay_in.matched_bank_transaction_id, matched) {
            (None, None) => Ok(pay_in.claimed.date),
            (Some(linked), Some(txn)) if txn.id == linked && txn.matched_pay_in_id == Some(pay_in.id) => {
                Ok(offset.local_date(txn.effective_at))
            }
            (linked, txn) => Err(CoreError::integrity(format!(
                "Pay-in {} links bank transaction {:?} but {:?} was resolved",
                pay_in.id,
                linked,
                txn.map(|t| (t.id, t.matched_pay_in_id))
            ))),
        }
    }

    /// Returns the single income already posted for a pay-in, if any.
    ///
    /// # Errors
    /// * `DataIntegrity` if more than one row exists or a row belongs elsewhere
    pub fn existing_posting(
        pay_in_id: PayInId,
        incomes: &[IncomeTransaction],
    ) -> Result<Option<&IncomeTransaction>, CoreError> {
        if let Some(stray) = incomes.iter().find(|i| i.pay_in_id != pay_in_id) {
            return Err(CoreError::integrity(format!(
                "Income {} for pay-in {} returned while reading pay-in {pay_in_id}",
                stray.id, stray.pay_in_id
            )));
        }
        match incomes {
            [] => Ok(None),
            [income] => Ok(Some(income)),
            _ => Err(CoreError::integrity(format!(
                "Pay-in {pay_in_id} has {} income rows",
                incomes.len()
            ))),
        }
    }

    /// Returns the income of an accepted pay-in, which must be exactly one row.
    ///
    /// # Errors
    /// * `DataIntegrity` if zero or several rows exist
    pub fn verify_posted(
        pay_in_id: PayInId,
        incomes: &[IncomeTransaction],
    ) -> Result<&IncomeTransaction, CoreError> {
        Self::existing_posting(pay_in_id, incomes)?.ok_or_else(|| {
            CoreError::integrity(format!("Accepted pay-in {pay_in_id} has no income row"))
        })
    }

    /// Builds the income row for a pay-in about to be accepted.
    #[must_use]
    pub fn build_income(
        pay_in: &PayIn,
        received_on: NaiveDate,
        posted_by: UserId,
        now: DateTime<Utc>,
    ) -> IncomeTransaction {
        IncomeTransaction {
            id: IncomeTransactionId::new(),
            house_id: pay_in.house_id,
            pay_in_id: pay_in.id,
            amount: pay_in.amount,
            received_on,
            posted_by,
            created_at: now,
        }
    }
}
