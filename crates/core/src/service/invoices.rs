//! Invoices and credit notes.

use tracing::info;

use moobaan_shared::types::{InvoiceId, Money, UserId};

use crate::clock::Clock;
use crate::credit::{CreditNote, CreditNoteRequest, CreditNoteService, Invoice, NewInvoice};
use crate::error::{CoreError, CoreResult};
use crate::store::{BillingStore, UnitOfWork};

use super::{BillingService, guard_period};

async fn require_invoice<U: UnitOfWork>(uow: &mut U, id: InvoiceId) -> CoreResult<Invoice> {
    uow.invoice(id)
        .await?
        .ok_or_else(|| CoreError::not_found("invoice", id))
}

impl<S: BillingStore, C: Clock> BillingService<S, C> {
    /// Issues an invoice dated in an open period.
    ///
    /// # Errors
    /// * `NotFound` if the house does not exist
    /// * `Validation` for bad input or an inactive house
    /// * `PeriodLocked` if the issue date falls in a locked period
    pub async fn create_invoice(&self, input: NewInvoice) -> CoreResult<Invoice> {
        let invoice = Invoice::new(input, self.clock.now())?;
        let mut uow = self.store.begin().await?;
        let house = uow
            .house(invoice.house_id)
            .await?
            .ok_or_else(|| CoreError::not_found("house", invoice.house_id))?;
        house.ensure_active()?;
        guard_period(&mut uow, invoice.issued_on, "create invoice").await?;
        uow.insert_invoice(&invoice).await?;
        uow.commit().await?;

        info!(invoice_id = %invoice.id, house_id = %invoice.house_id, total = %invoice.total_amount, "invoice created");
        Ok(invoice)
    }

    /// Appends a credit note to an invoice.
    ///
    /// # Errors
    /// * `NotFound` if the invoice does not exist
    /// * `Validation` for bad input
    /// * `CreditExceedsBalance` when the amount is above the remaining balance
    /// * `PeriodLocked` if today's regional date falls in a locked period
    pub async fn issue_credit_note(
        &self,
        request: CreditNoteRequest,
        issued_by: UserId,
    ) -> CoreResult<CreditNote> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let invoice = require_invoice(&mut uow, request.invoice_id).await?;
        let prior = uow.credit_notes_for_invoice(invoice.id).await?;
        guard_period(&mut uow, self.settings.offset.local_date(now), "issue credit note").await?;

        let note = CreditNoteService::issue(&invoice, &prior, request, issued_by, now)?;
        uow.insert_credit_note(&note).await?;
        uow.commit().await?;

        info!(
            credit_note_id = %note.id,
            invoice_id = %invoice.id,
            amount = %note.amount,
            full_credit = note.is_full_credit,
            %issued_by,
            "credit note issued"
        );
        Ok(note)
    }

    /// Invoice total minus all credit notes.
    ///
    /// # Errors
    /// * `NotFound` if the invoice does not exist
    pub async fn outstanding_balance(&self, invoice_id: InvoiceId) -> CoreResult<Money> {
        let mut uow = self.store.begin().await?;
        let invoice = require_invoice(&mut uow, invoice_id).await?;
        let notes = uow.credit_notes_for_invoice(invoice_id).await?;
        CreditNoteService::remaining_balance(&invoice, &notes)
    }
}
