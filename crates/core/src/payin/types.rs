//! Pay-in domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use moobaan_shared::types::{
    BankTransactionId, HouseId, Money, PayInId, RegionalOffset, TimeError, UserId,
};

/// Pay-in status in the reconciliation workflow.
///
/// The valid transitions are:
/// - Draft → Submitted (submit)
/// - RejectedNeedsFix → Submitted (resubmit after fix)
/// - Submitted | Matched → RejectedNeedsFix (reject)
/// - Submitted | RejectedNeedsFix → Matched (match)
/// - Matched → Submitted (unmatch)
/// - Matched | Submitted | RejectedNeedsFix → Accepted (accept)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayInStatus {
    /// Claim is being prepared by the resident.
    Draft,
    /// Claim awaits reconciliation. Legacy rows stored as `PENDING` map here.
    #[serde(alias = "PENDING")]
    Submitted,
    /// Admin rejected the claim; the resident may fix and resubmit.
    RejectedNeedsFix,
    /// Claim is linked to a bank transaction but not yet accepted.
    Matched,
    /// Claim is accepted and posted to the ledger (immutable).
    Accepted,
}

impl PayInStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::Submitted,
        Self::RejectedNeedsFix,
        Self::Matched,
        Self::Accepted,
    ];

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::RejectedNeedsFix => "REJECTED_NEEDS_FIX",
            Self::Matched => "MATCHED",
            Self::Accepted => "ACCEPTED",
        }
    }

    /// Parses a status from a string.
    ///
    /// The legacy `PENDING` value is read as `Submitted`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "SUBMITTED" | "PENDING" => Some(Self::Submitted),
            "REJECTED_NEEDS_FIX" => Some(Self::RejectedNeedsFix),
            "MATCHED" => Some(Self::Matched),
            "ACCEPTED" => Some(Self::Accepted),
            _ => None,
        }
    }

    /// Returns true if amount and transfer time may still change.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Submitted | Self::RejectedNeedsFix)
    }

    /// Returns true if the pay-in may be linked to a bank transaction.
    #[must_use]
    pub fn is_matchable(&self) -> bool {
        matches!(self, Self::Submitted | Self::RejectedNeedsFix)
    }

    /// Returns true if the pay-in is immutable.
    #[must_use]
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl fmt::Display for PayInStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Channel through which a pay-in claim arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayInSource {
    /// Filed by a resident through the app.
    Resident,
    /// Entered by an admin, usually from a bank statement line.
    AdminCreated,
    /// Received through the LINE chat integration.
    LineReceived,
}

impl PayInSource {
    /// Returns the string representation of the source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resident => "RESIDENT",
            Self::AdminCreated => "ADMIN_CREATED",
            Self::LineReceived => "LINE_RECEIVED",
        }
    }

    /// Status a freshly created pay-in starts in.
    ///
    /// Admin and LINE entries skip the draft stage.
    #[must_use]
    pub fn initial_status(&self, submit_immediately: bool) -> PayInStatus {
        match self {
            Self::Resident if !submit_immediately => PayInStatus::Draft,
            _ => PayInStatus::Submitted,
        }
    }
}

impl fmt::Display for PayInSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transfer time as reported by the resident, in regional wall-clock terms.
///
/// Hour and minute are kept for display; the canonical instant lives on
/// [`PayIn::transfer_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedTransfer {
    /// Local calendar date of the transfer.
    pub date: NaiveDate,
    /// Local hour (0-23).
    pub hour: u32,
    /// Local minute (0-59).
    pub minute: u32,
}

impl ClaimedTransfer {
    /// Creates a claimed transfer time.
    #[must_use]
    pub const fn new(date: NaiveDate, hour: u32, minute: u32) -> Self {
        Self { date, hour, minute }
    }

    /// Canonical UTC instant under the regional offset.
    pub fn instant(&self, offset: RegionalOffset) -> Result<DateTime<Utc>, TimeError> {
        offset.to_utc(self.date, self.hour, self.minute)
    }
}

/// A resident payment claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayIn {
    /// Unique identifier.
    pub id: PayInId,
    /// House the payment is for.
    pub house_id: HouseId,
    /// Claimed amount.
    pub amount: Money,
    /// Transfer time as reported, for display.
    pub claimed: ClaimedTransfer,
    /// Canonical transfer instant in UTC.
    pub transfer_at: DateTime<Utc>,
    /// Channel the claim came through.
    pub source: PayInSource,
    /// Lifecycle status.
    pub status: PayInStatus,
    /// Bank transaction this claim is linked to.
    pub matched_bank_transaction_id: Option<BankTransactionId>,
    /// Admin who linked the claim; `None` for automatic matches.
    pub matched_by: Option<UserId>,
    /// When the current link was made.
    pub matched_at: Option<DateTime<Utc>>,
    /// Reason given by the admin on rejection.
    pub rejection_reason: Option<String>,
    /// Who filed the claim.
    pub created_by: UserId,
    /// Admin who accepted the claim.
    pub accepted_by: Option<UserId>,
    /// When the claim was accepted.
    pub accepted_at: Option<DateTime<Utc>>,
    /// When the claim was created.
    pub created_at: DateTime<Utc>,
    /// When the claim last changed.
    pub updated_at: DateTime<Utc>,
    /// Row version, bumped by every transition. Stores compare it on update.
    pub version: i32,
}

/// Input for creating a pay-in.
#[derive(Debug, Clone)]
pub struct NewPayIn {
    /// House the payment is for.
    pub house_id: HouseId,
    /// Claimed amount.
    pub amount: Decimal,
    /// Reported transfer time.
    pub claimed: ClaimedTransfer,
    /// Channel.
    pub source: PayInSource,
    /// Acting user.
    pub created_by: UserId,
    /// Resident pay-ins start as draft unless this is set.
    pub submit_immediately: bool,
}

/// Changes to an editable pay-in. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct PayInEdit {
    /// New claimed amount.
    pub amount: Option<Decimal>,
    /// New reported transfer time.
    pub claimed: Option<ClaimedTransfer>,
}
