//! Imported bank statement rows.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use moobaan_shared::types::{BankTransactionId, Money, PayInId, RegionalOffset};

use crate::error::CoreError;

/// One row of a bank statement before normalization.
///
/// Statement timestamps are naive local wall-clock values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatementRow {
    /// Local wall-clock time the bank reports.
    pub occurred_at: NaiveDateTime,
    /// Money received, if this is a credit row.
    pub credit: Option<Decimal>,
    /// Money paid out, if this is a debit row.
    pub debit: Option<Decimal>,
    /// Free-text narrative from the statement.
    pub description: String,
    /// Bank's own reference, if any.
    pub bank_reference: Option<String>,
}

/// One imported bank statement row with its timestamp in UTC.
///
/// Exactly one of `credit` and `debit` is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Unique identifier.
    pub id: BankTransactionId,
    /// When the money moved, in UTC.
    pub effective_at: DateTime<Utc>,
    /// Money received.
    pub credit: Option<Money>,
    /// Money paid out.
    pub debit: Option<Money>,
    /// Statement narrative.
    pub description: String,
    /// Bank's own reference.
    pub bank_reference: Option<String>,
    /// Pay-in this row settles, if matched.
    pub matched_pay_in_id: Option<PayInId>,
    /// When the row was imported.
    pub imported_at: DateTime<Utc>,
}

impl BankTransaction {
    /// Normalizes a statement row into a transaction.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if both or neither of credit/debit are set, if
    /// the populated side is not a positive baht amount, or if the
    /// timestamp cannot be converted.
    pub fn import(
        row: BankStatementRow,
        offset: RegionalOffset,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let (credit, debit) = match (row.credit, row.debit) {
            (Some(credit), None) => (Some(Money::positive(credit)?), None),
            (None, Some(debit)) => (None, Some(Money::positive(debit)?)),
            _ => {
                return Err(CoreError::Validation(
                    "Statement row must have exactly one of credit or debit".to_string(),
                ));
            }
        };

        Ok(Self {
            id: BankTransactionId::new(),
            effective_at: offset.to_utc_naive(row.occurred_at)?,
            credit,
            debit,
            description: row.description.trim().to_string(),
            bank_reference: row.bank_reference,
            matched_pay_in_id: None,
            imported_at: now,
        })
    }

    /// Returns the credited amount if this row is a positive credit.
    #[must_use]
    pub fn credit_amount(&self) -> Option<Money> {
        self.credit.filter(Money::is_positive)
    }

    /// Returns true if this row received money.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.credit_amount().is_some()
    }

    /// Returns true if this row is a credit not yet linked to a pay-in.
    #[must_use]
    pub fn is_match_candidate(&self) -> bool {
        self.is_credit() && self.matched_pay_in_id.is_none()
    }
}
