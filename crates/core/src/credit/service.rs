//! Credit note rules.

use chrono::{DateTime, Utc};

use moobaan_shared::types::{CreditNoteId, Money, UserId};

use crate::credit::types::{CreditNote, CreditNoteRequest, Invoice};
use crate::error::CoreError;

/// Stateless credit note rules.
pub struct CreditNoteService;

impl CreditNoteService {
    /// Invoice total minus every prior credit.
    ///
    /// # Errors
    /// * `DataIntegrity` if a note belongs to another invoice or credits exceed the total
    pub fn remaining_balance(invoice: &Invoice, prior: &[CreditNote]) -> Result<Money, CoreError> {
        if let Some(stray) = prior.iter().find(|n| n.invoice_id != invoice.id) {
            return Err(CoreError::integrity(format!(
                "Credit note {} for invoice {} read as a credit on invoice {}",
                stray.id, stray.invoice_id, invoice.id
            )));
        }
        let credited: Money = prior.iter().map(|n| n.amount).sum();
        let remaining = invoice.total_amount - credited;
        if remaining.is_negative() {
            return Err(CoreError::integrity(format!(
                "Invoice {} is over-credited by {}",
                invoice.id,
                Money::ZERO - remaining
            )));
        }
        Ok(remaining)
    }

    /// Validates a request against the invoice's remaining balance.
    ///
    /// # Errors
    /// * `Validation` for a non-positive amount, blank reason, or a full
    ///   credit that does not equal the remaining balance
    /// * `CreditExceedsBalance` when the amount is above the remaining balance
    pub fn issue(
        invoice: &Invoice,
        prior: &[CreditNote],
        request: CreditNoteRequest,
        issued_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<CreditNote, CoreError> {
        if request.invoice_id != invoice.id {
            return Err(CoreError::Validation(format!(
                "Credit note targets invoice {} but invoice {} was supplied",
                request.invoice_id, invoice.id
            )));
        }
        let amount = Money::positive(request.amount)?;
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(CoreError::Validation(
                "Credit note reason is required".to_string(),
            ));
        }

        let remaining = Self::remaining_balance(invoice, prior)?;
        if amount > remaining {
            return Err(CoreError::CreditExceedsBalance {
                requested: amount,
                remaining,
            });
        }
        if request.is_full_credit && amount != remaining {
            return Err(CoreError::Validation(format!(
                "A full credit must equal the remaining balance of {remaining}, got {amount}"
            )));
        }

        Ok(CreditNote {
            id: CreditNoteId::new(),
            invoice_id: invoice.id,
            amount,
            reason: reason.to_string(),
            is_full_credit: request.is_full_credit,
            issued_by,
            issued_at: now,
        })
    }
}
