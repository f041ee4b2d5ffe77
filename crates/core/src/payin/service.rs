//! Pay-in service for lifecycle state transitions.
//!
//! Every method is a pure function: it validates the transition against
//! the current `PayIn` value and returns the next value. Persisting the
//! result (with a compare-and-set on the prior status and version) is the
//! caller's job. Each returned value carries the next version.

use chrono::{DateTime, Utc};

use moobaan_shared::types::{Money, PayInId, RegionalOffset, UserId};

use crate::bank::BankTransaction;
use crate::error::CoreError;
use crate::payin::types::{NewPayIn, PayIn, PayInEdit, PayInStatus};

const ENTITY: &str = "pay-in";

/// Outcome of validating an accept request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// The pay-in transitions to the contained accepted value.
    Accept(PayIn),
    /// The pay-in was accepted earlier; nothing changes.
    AlreadyAccepted,
}

/// Stateless service for pay-in lifecycle transitions.
pub struct PayInService;

impl PayInService {
    /// Creates a pay-in in its source's initial status.
    ///
    /// # Errors
    /// * `Validation` if the amount is not positive or the time is invalid
    pub fn create(
        input: NewPayIn,
        offset: RegionalOffset,
        now: DateTime<Utc>,
    ) -> Result<PayIn, CoreError> {
        let amount = Money::positive(input.amount)?;
        let transfer_at = input.claimed.instant(offset)?;

        Ok(PayIn {
            id: PayInId::new(),
            house_id: input.house_id,
            amount,
            claimed: input.claimed,
            transfer_at,
            source: input.source,
            status: input.source.initial_status(input.submit_immediately),
            matched_bank_transaction_id: None,
            matched_by: None,
            matched_at: None,
            rejection_reason: None,
            created_by: input.created_by,
            accepted_by: None,
            accepted_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// Submits a draft, or resubmits a rejected claim after it was fixed.
    ///
    /// # Errors
    /// * `ImmutableRecord` if accepted
    /// * `InvalidState` if not Draft or RejectedNeedsFix
    pub fn submit(pay_in: &PayIn, now: DateTime<Utc>) -> Result<PayIn, CoreError> {
        Self::ensure_mutable(pay_in)?;
        match pay_in.status {
            PayInStatus::Draft | PayInStatus::RejectedNeedsFix => Ok(PayIn {
                status: PayInStatus::Submitted,
                rejection_reason: None,
                updated_at: now,
                version: pay_in.version + 1,
                ..pay_in.clone()
            }),
            status => Err(CoreError::invalid_state(ENTITY, "submit", status)),
        }
    }

    /// Changes amount and/or transfer time.
    ///
    /// # Errors
    /// * `ImmutableRecord` if accepted
    /// * `InvalidState` if matched (unmatch first)
    /// * `Validation` for a non-positive amount or invalid time
    pub fn edit(
        pay_in: &PayIn,
        edit: PayInEdit,
        offset: RegionalOffset,
        now: DateTime<Utc>,
    ) -> Result<PayIn, CoreError> {
        Self::ensure_mutable(pay_in)?;
        if !pay_in.status.is_editable() {
            return Err(CoreError::invalid_state(ENTITY, "edit", pay_in.status));
        }

        let mut next = pay_in.clone();
        if let Some(amount) = edit.amount {
            next.amount = Money::positive(amount)?;
        }
        if let Some(claimed) = edit.claimed {
            next.transfer_at = claimed.instant(offset)?;
            next.claimed = claimed;
        }
        next.updated_at = now;
        next.version = pay_in.version + 1;
        Ok(next)
    }

    /// Rejects a submitted or matched claim with a mandatory reason.
    ///
    /// A matched claim loses its bank link; the caller must clear the
    /// counterpart's back-reference in the same unit of work.
    ///
    /// # Errors
    /// * `Validation` if the reason is blank
    /// * `ImmutableRecord` if accepted
    /// * `InvalidState` if not Submitted or Matched
    pub fn reject(pay_in: &PayIn, reason: &str, now: DateTime<Utc>) -> Result<PayIn, CoreError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::Validation(
                "Rejection reason is required".to_string(),
            ));
        }
        Self::ensure_mutable(pay_in)?;

        match pay_in.status {
            PayInStatus::Submitted | PayInStatus::Matched => Ok(PayIn {
                status: PayInStatus::RejectedNeedsFix,
                matched_bank_transaction_id: None,
                matched_by: None,
                matched_at: None,
                rejection_reason: Some(reason.to_string()),
                updated_at: now,
                version: pay_in.version + 1,
                ..pay_in.clone()
            }),
            status => Err(CoreError::invalid_state(ENTITY, "reject", status)),
        }
    }

    /// Links a claim to a bank credit.
    ///
    /// Amount and time are not checked here; the automatic matcher applies
    /// its tolerance before calling this, while manual matches bypass it.
    /// `matched_by` is the admin for a manual match, `None` for the matcher.
    ///
    /// # Errors
    /// * `ImmutableRecord` if accepted
    /// * `InvalidState` if not Submitted or RejectedNeedsFix
    /// * `Validation` if the transaction is not a credit
    /// * `AlreadyMatched` if either side already holds a link
    pub fn link(
        pay_in: &PayIn,
        transaction: &BankTransaction,
        matched_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<PayIn, CoreError> {
        Self::ensure_mutable(pay_in)?;
        if pay_in.matched_bank_transaction_id.is_some() || transaction.matched_pay_in_id.is_some() {
            return Err(CoreError::AlreadyMatched {
                pay_in_id: pay_in.id,
                bank_transaction_id: transaction.id,
            });
        }
        if !pay_in.status.is_matchable() {
            return Err(CoreError::invalid_state(ENTITY, "match", pay_in.status));
        }
        if !transaction.is_credit() {
            return Err(CoreError::Validation(format!(
                "Bank transaction {} is not a credit",
                transaction.id
            )));
        }

        Ok(PayIn {
            status: PayInStatus::Matched,
            matched_bank_transaction_id: Some(transaction.id),
            matched_by,
            matched_at: Some(now),
            rejection_reason: None,
            updated_at: now,
            version: pay_in.version + 1,
            ..pay_in.clone()
        })
    }

    /// Removes the bank link from a matched claim.
    ///
    /// # Errors
    /// * `ImmutableRecord` if accepted
    /// * `InvalidState` if not Matched
    pub fn unlink(pay_in: &PayIn, now: DateTime<Utc>) -> Result<PayIn, CoreError> {
        Self::ensure_mutable(pay_in)?;
        match pay_in.status {
            PayInStatus::Matched => Ok(PayIn {
                status: PayInStatus::Submitted,
                matched_bank_transaction_id: None,
                matched_by: None,
                matched_at: None,
                updated_at: now,
                version: pay_in.version + 1,
                ..pay_in.clone()
            }),
            status => Err(CoreError::invalid_state(ENTITY, "unmatch", status)),
        }
    }

    /// Accepts a claim.
    ///
    /// Matched claims are the normal path. Submitted and rejected claims may
    /// be accepted directly when an admin vouches for the payment. Accepting
    /// an accepted claim is a no-op.
    ///
    /// # Errors
    /// * `InvalidState` if still a draft
    pub fn accept(
        pay_in: &PayIn,
        accepted_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Acceptance, CoreError> {
        match pay_in.status {
            PayInStatus::Accepted => Ok(Acceptance::AlreadyAccepted),
            PayInStatus::Matched | PayInStatus::Submitted | PayInStatus::RejectedNeedsFix => {
                Ok(Acceptance::Accept(PayIn {
                    status: PayInStatus::Accepted,
                    accepted_by: Some(accepted_by),
                    accepted_at: Some(now),
                    updated_at: now,
                    version: pay_in.version + 1,
                    ..pay_in.clone()
                }))
            }
            PayInStatus::Draft => Err(CoreError::invalid_state(ENTITY, "accept", pay_in.status)),
        }
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn is_valid_transition(from: PayInStatus, to: PayInStatus) -> bool {
        use PayInStatus::{Accepted, Draft, Matched, RejectedNeedsFix, Submitted};
        matches!(
            (from, to),
            (Draft | RejectedNeedsFix, Submitted)
                | (Submitted | Matched, RejectedNeedsFix)
                | (Submitted | RejectedNeedsFix, Matched)
                | (Matched, Submitted)
                | (Matched | Submitted | RejectedNeedsFix, Accepted)
        )
    }

    fn ensure_mutable(pay_in: &PayIn) -> Result<(), CoreError> {
        if pay_in.status.is_immutable() {
            return Err(CoreError::ImmutableRecord {
                record: format!("Accepted pay-in {}", pay_in.id),
            });
        }
        Ok(())
    }
}
