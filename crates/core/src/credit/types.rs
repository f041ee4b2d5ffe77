//! Invoice and credit note types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use moobaan_shared::types::{CreditNoteId, HouseId, InvoiceId, Money, UserId};

use crate::error::CoreError;

/// A bill issued to a house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier.
    pub id: InvoiceId,
    /// Billed house.
    pub house_id: HouseId,
    /// Amount billed.
    pub total_amount: Money,
    /// Issue date; determines the accounting period.
    pub issued_on: NaiveDate,
    /// Payment due date.
    pub due_on: NaiveDate,
    /// When the invoice was recorded.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Billed house.
    pub house_id: HouseId,
    /// Amount billed.
    pub total_amount: Decimal,
    /// Issue date.
    pub issued_on: NaiveDate,
    /// Payment due date.
    pub due_on: NaiveDate,
}

impl Invoice {
    /// Validates the input and builds an invoice.
    pub fn new(input: NewInvoice, now: DateTime<Utc>) -> Result<Self, CoreError> {
        let total_amount = Money::positive(input.total_amount)?;
        if input.due_on < input.issued_on {
            return Err(CoreError::Validation(format!(
                "Due date {} is before issue date {}",
                input.due_on, input.issued_on
            )));
        }
        Ok(Self {
            id: InvoiceId::new(),
            house_id: input.house_id,
            total_amount,
            issued_on: input.issued_on,
            due_on: input.due_on,
            created_at: now,
        })
    }
}

/// Immutable reduction of an invoice's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNote {
    /// Unique identifier.
    pub id: CreditNoteId,
    /// Invoice being reduced.
    pub invoice_id: InvoiceId,
    /// Credited amount.
    pub amount: Money,
    /// Why the credit was granted.
    pub reason: String,
    /// Whether this note cancels the invoice outright.
    pub is_full_credit: bool,
    /// Acting admin.
    pub issued_by: UserId,
    /// When the note was issued.
    pub issued_at: DateTime<Utc>,
}

/// Input for issuing a credit note.
#[derive(Debug, Clone)]
pub struct CreditNoteRequest {
    /// Invoice being reduced.
    pub invoice_id: InvoiceId,
    /// Requested amount.
    pub amount: Decimal,
    /// Mandatory reason.
    pub reason: String,
    /// Cancel the whole remaining balance.
    pub is_full_credit: bool,
}
