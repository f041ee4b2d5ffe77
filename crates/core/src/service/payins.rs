//! Houses, memberships and the pay-in lifecycle.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use moobaan_shared::types::{HouseId, PayInId, UserId};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::house::{self, House, MembershipRole, ResidentMembership};
use crate::ledger::{IncomeTransaction, LedgerPoster};
use crate::payin::{Acceptance, NewPayIn, PayIn, PayInEdit, PayInService, PayInSource, PayInStatus};
use crate::store::{BillingStore, UnitOfWork};

use super::{BillingService, guard_period, require_bank_transaction, require_pay_in};

/// Result of an accept call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// The accepted pay-in.
    pub pay_in: PayIn,
    /// Its single income row.
    pub income: IncomeTransaction,
    /// False when the pay-in had already been accepted.
    pub newly_posted: bool,
}

impl<S: BillingStore, C: Clock> BillingService<S, C> {
    /// Registers a house.
    ///
    /// # Errors
    /// * `Validation` for a blank code
    /// * `Conflict` if the code is taken
    pub async fn register_house(&self, code: &str) -> CoreResult<House> {
        let house = House::new(code, self.clock.now())?;
        let mut uow = self.store.begin().await?;
        uow.insert_house(&house).await?;
        uow.commit().await?;
        info!(house_id = %house.id, code = %house.code, "house registered");
        Ok(house)
    }

    /// Adds a resident to a house.
    ///
    /// # Errors
    /// * `NotFound` if the house does not exist
    /// * `Validation` if the house is inactive, full, or the user is already a member
    pub async fn add_membership(
        &self,
        house_id: HouseId,
        user_id: UserId,
        role: MembershipRole,
    ) -> CoreResult<ResidentMembership> {
        let mut uow = self.store.begin().await?;
        let house = uow
            .house(house_id)
            .await?
            .ok_or_else(|| CoreError::not_found("house", house_id))?;
        let existing = uow.memberships_for_house(house_id).await?;
        let membership = house::admit_resident(&house, &existing, user_id, role, self.clock.now())?;
        uow.insert_membership(&membership).await?;
        uow.commit().await?;
        info!(%house_id, %user_id, "membership added");
        Ok(membership)
    }

    /// Files a payment claim.
    ///
    /// # Errors
    /// * `NotFound` if the house does not exist
    /// * `Validation` for an inactive house, a resident without an active
    ///   membership, a non-positive amount, or an invalid time
    pub async fn create_pay_in(&self, input: NewPayIn) -> CoreResult<PayIn> {
        let mut uow = self.store.begin().await?;
        let house = uow
            .house(input.house_id)
            .await?
            .ok_or_else(|| CoreError::not_found("house", input.house_id))?;
        house.ensure_active()?;

        if input.source == PayInSource::Resident {
            let memberships = uow.memberships_for_house(house.id).await?;
            if !house::is_active_resident(&memberships, input.created_by) {
                return Err(CoreError::Validation(format!(
                    "User {} is not an active resident of house {}",
                    input.created_by, house.code
                )));
            }
        }

        let pay_in = PayInService::create(input, self.settings.offset, self.clock.now())?;
        uow.insert_pay_in(&pay_in).await?;
        uow.commit().await?;
        info!(
            pay_in_id = %pay_in.id,
            house_id = %pay_in.house_id,
            amount = %pay_in.amount,
            source = %pay_in.source,
            status = %pay_in.status,
            "pay-in created"
        );
        Ok(pay_in)
    }

    /// Submits a draft or resubmits a fixed claim.
    ///
    /// # Errors
    /// * `NotFound`, `InvalidState`, `ImmutableRecord`, `Conflict`
    pub async fn submit_pay_in(&self, id: PayInId) -> CoreResult<PayIn> {
        self.transition(id, "submitted", PayInService::submit).await
    }

    /// Edits amount and/or transfer time.
    ///
    /// # Errors
    /// * `NotFound`, `InvalidState`, `ImmutableRecord`, `Validation`, `Conflict`
    pub async fn edit_pay_in(&self, id: PayInId, edit: PayInEdit) -> CoreResult<PayIn> {
        let offset = self.settings.offset;
        self.transition(id, "edited", move |pay_in, now| {
            PayInService::edit(pay_in, edit, offset, now)
        })
        .await
    }

    /// Rejects a claim, releasing its bank match in the same unit of work.
    ///
    /// # Errors
    /// * `NotFound`, `Validation`, `InvalidState`, `ImmutableRecord`, `Conflict`
    pub async fn reject_pay_in(&self, id: PayInId, reason: &str) -> CoreResult<PayIn> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let pay_in = require_pay_in(&mut uow, id).await?;
        let rejected = PayInService::reject(&pay_in, reason, now)?;

        uow.update_pay_in(&rejected, &pay_in).await?;
        if let Some(txn_id) = pay_in.matched_bank_transaction_id {
            uow.release_bank_transaction(txn_id, id).await?;
        }
        uow.commit().await?;

        info!(
            pay_in_id = %id,
            released_bank_transaction = ?pay_in.matched_bank_transaction_id,
            "pay-in rejected"
        );
        Ok(rejected)
    }

    /// Accepts a claim and posts its income exactly once.
    ///
    /// Acceptance and posting commit together. Accepting an accepted claim
    /// returns the existing income. A concurrent accept that loses the race
    /// on the income uniqueness constraint resolves to the winner's result.
    ///
    /// # Errors
    /// * `NotFound` if the pay-in does not exist
    /// * `InvalidState` for a draft
    /// * `PeriodLocked` if the received date falls in a locked period
    /// * `DataIntegrity` if income rows disagree with the pay-in status
    pub async fn accept_pay_in(&self, id: PayInId, accepted_by: UserId) -> CoreResult<AcceptOutcome> {
        match self.try_accept(id, accepted_by).await {
            Err(err @ (CoreError::DuplicatePosting { .. } | CoreError::Conflict(_))) => {
                warn!(pay_in_id = %id, error = %err, "accept raced, re-reading");
                self.resolve_raced_accept(id, err).await
            }
            other => other,
        }
    }

    async fn try_accept(&self, id: PayInId, accepted_by: UserId) -> CoreResult<AcceptOutcome> {
        let mut uow = self.store.begin().await?;
        let outcome = self.stage_accept(&mut uow, id, accepted_by).await?;
        if !outcome.newly_posted {
            return Ok(outcome);
        }
        uow.commit().await?;

        info!(
            pay_in_id = %id,
            income_id = %outcome.income.id,
            amount = %outcome.income.amount,
            received_on = %outcome.income.received_on,
            accepted_by = %accepted_by,
            "pay-in accepted and income posted"
        );
        Ok(outcome)
    }

    /// Writes an accept and its income into `uow` without committing.
    pub(super) async fn stage_accept<U: UnitOfWork>(
        &self,
        uow: &mut U,
        id: PayInId,
        accepted_by: UserId,
    ) -> CoreResult<AcceptOutcome> {
        let now = self.clock.now();
        let pay_in = require_pay_in(uow, id).await?;
        let incomes = uow.incomes_for_pay_in(id).await?;

        let accepted = match PayInService::accept(&pay_in, accepted_by, now)? {
            Acceptance::AlreadyAccepted => {
                let income = LedgerPoster::verify_posted(id, &incomes)?.clone();
                info!(pay_in_id = %id, "pay-in already accepted");
                return Ok(AcceptOutcome {
                    pay_in,
                    income,
                    newly_posted: false,
                });
            }
            Acceptance::Accept(accepted) => accepted,
        };

        if let Some(existing) = LedgerPoster::existing_posting(id, &incomes)? {
            return Err(CoreError::integrity(format!(
                "Pay-in {id} is {} but income {} already exists",
                pay_in.status, existing.id
            )));
        }

        let matched = match pay_in.matched_bank_transaction_id {
            Some(txn_id) => Some(require_bank_transaction(uow, txn_id).await?),
            None => None,
        };
        let received_on = LedgerPoster::received_date(&pay_in, matched.as_ref(), self.settings.offset)?;
        guard_period(uow, received_on, "post income").await?;

        let income = LedgerPoster::build_income(&pay_in, received_on, accepted_by, now);
        uow.insert_income(&income).await?;
        uow.update_pay_in(&accepted, &pay_in).await?;
        Ok(AcceptOutcome {
            pay_in: accepted,
            income,
            newly_posted: true,
        })
    }

    async fn resolve_raced_accept(&self, id: PayInId, cause: CoreError) -> CoreResult<AcceptOutcome> {
        let mut uow = self.store.begin().await?;
        let pay_in = require_pay_in(&mut uow, id).await?;
        let incomes = uow.incomes_for_pay_in(id).await?;

        if pay_in.status == PayInStatus::Accepted {
            let income = LedgerPoster::verify_posted(id, &incomes)?.clone();
            return Ok(AcceptOutcome {
                pay_in,
                income,
                newly_posted: false,
            });
        }
        match cause {
            CoreError::DuplicatePosting { .. } => Err(CoreError::integrity(format!(
                "Pay-in {id} is {} but income was posted concurrently",
                pay_in.status
            ))),
            other => Err(other),
        }
    }

    /// Loads a pay-in, applies a pure transition, and stores the result.
    async fn transition<F>(&self, id: PayInId, verb: &'static str, apply: F) -> CoreResult<PayIn>
    where
        F: FnOnce(&PayIn, DateTime<Utc>) -> CoreResult<PayIn> + Send,
    {
        let mut uow = self.store.begin().await?;
        let pay_in = require_pay_in(&mut uow, id).await?;
        let next = apply(&pay_in, self.clock.now())?;
        uow.update_pay_in(&next, &pay_in).await?;
        uow.commit().await?;
        info!(pay_in_id = %id, from = %pay_in.status, to = %next.status, "pay-in {verb}");
        Ok(next)
    }

    /// Loads a pay-in.
    ///
    /// # Errors
    /// * `NotFound`
    pub async fn pay_in(&self, id: PayInId) -> CoreResult<PayIn> {
        let mut uow = self.store.begin().await?;
        require_pay_in(&mut uow, id).await
    }

    /// Income rows of a pay-in.
    ///
    /// # Errors
    /// * `Storage`
    pub async fn incomes_for_pay_in(&self, id: PayInId) -> CoreResult<Vec<IncomeTransaction>> {
        let mut uow = self.store.begin().await?;
        uow.incomes_for_pay_in(id).await
    }
}
