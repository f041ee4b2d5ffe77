//! Income records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use moobaan_shared::types::{HouseId, IncomeTransactionId, Money, PayInId, UserId};

/// Immutable income posted for one accepted pay-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeTransaction {
    /// Unique identifier.
    pub id: IncomeTransactionId,
    /// House the income belongs to.
    pub house_id: HouseId,
    /// Originating pay-in; unique across all income rows.
    pub pay_in_id: PayInId,
    /// Settled amount.
    pub amount: Money,
    /// Regional calendar date the money was received.
    pub received_on: NaiveDate,
    /// Admin whose acceptance posted the row.
    pub posted_by: UserId,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}
