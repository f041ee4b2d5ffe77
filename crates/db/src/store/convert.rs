//! Conversions between table models and domain types.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::DateTimeWithTimeZone;

use moobaan_core::CoreError;
use moobaan_core::bank::BankTransaction;
use moobaan_core::credit::{CreditNote, Invoice};
use moobaan_core::house::{self, House, ResidentMembership};
use moobaan_core::ledger::IncomeTransaction;
use moobaan_core::payin::{self, ClaimedTransfer, PayIn};
use moobaan_core::period::{self, PeriodSnapshot, PeriodUnlockLog, YearMonth};
use moobaan_shared::types::Money;

use crate::entities::sea_orm_active_enums as db;
use crate::entities::{
    bank_transactions, credit_notes, houses, income_transactions, invoices, pay_ins,
    period_snapshots, period_unlock_logs, resident_memberships,
};

pub(super) fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub(super) fn tz(at: DateTime<Utc>) -> DateTimeWithTimeZone {
    at.into()
}

fn out_of_range(column: &str, value: impl std::fmt::Display) -> CoreError {
    CoreError::integrity(format!("Stored {column} {value} is out of range"))
}

// ============================================================================
// Enums
// ============================================================================

impl From<db::PayInStatus> for payin::PayInStatus {
    fn from(status: db::PayInStatus) -> Self {
        match status {
            db::PayInStatus::Draft => Self::Draft,
            db::PayInStatus::Pending | db::PayInStatus::Submitted => Self::Submitted,
            db::PayInStatus::RejectedNeedsFix => Self::RejectedNeedsFix,
            db::PayInStatus::Matched => Self::Matched,
            db::PayInStatus::Accepted => Self::Accepted,
        }
    }
}

impl From<payin::PayInStatus> for db::PayInStatus {
    fn from(status: payin::PayInStatus) -> Self {
        match status {
            payin::PayInStatus::Draft => Self::Draft,
            payin::PayInStatus::Submitted => Self::Submitted,
            payin::PayInStatus::RejectedNeedsFix => Self::RejectedNeedsFix,
            payin::PayInStatus::Matched => Self::Matched,
            payin::PayInStatus::Accepted => Self::Accepted,
        }
    }
}

/// Stored values a domain status may be persisted as.
pub(super) fn stored_statuses(status: payin::PayInStatus) -> Vec<db::PayInStatus> {
    match status {
        payin::PayInStatus::Submitted => vec![db::PayInStatus::Submitted, db::PayInStatus::Pending],
        other => vec![other.into()],
    }
}

impl From<db::PayInSource> for payin::PayInSource {
    fn from(source: db::PayInSource) -> Self {
        match source {
            db::PayInSource::Resident => Self::Resident,
            db::PayInSource::AdminCreated => Self::AdminCreated,
            db::PayInSource::LineReceived => Self::LineReceived,
        }
    }
}

impl From<payin::PayInSource> for db::PayInSource {
    fn from(source: payin::PayInSource) -> Self {
        match source {
            payin::PayInSource::Resident => Self::Resident,
            payin::PayInSource::AdminCreated => Self::AdminCreated,
            payin::PayInSource::LineReceived => Self::LineReceived,
        }
    }
}

impl From<db::HouseStatus> for house::HouseStatus {
    fn from(status: db::HouseStatus) -> Self {
        match status {
            db::HouseStatus::Active => Self::Active,
            db::HouseStatus::Inactive => Self::Inactive,
        }
    }
}

impl From<house::HouseStatus> for db::HouseStatus {
    fn from(status: house::HouseStatus) -> Self {
        match status {
            house::HouseStatus::Active => Self::Active,
            house::HouseStatus::Inactive => Self::Inactive,
        }
    }
}

impl From<db::MembershipRole> for house::MembershipRole {
    fn from(role: db::MembershipRole) -> Self {
        match role {
            db::MembershipRole::Owner => Self::Owner,
            db::MembershipRole::Family => Self::Family,
        }
    }
}

impl From<house::MembershipRole> for db::MembershipRole {
    fn from(role: house::MembershipRole) -> Self {
        match role {
            house::MembershipRole::Owner => Self::Owner,
            house::MembershipRole::Family => Self::Family,
        }
    }
}

impl From<db::MembershipStatus> for house::MembershipStatus {
    fn from(status: db::MembershipStatus) -> Self {
        match status {
            db::MembershipStatus::Active => Self::Active,
            db::MembershipStatus::Inactive => Self::Inactive,
        }
    }
}

impl From<house::MembershipStatus> for db::MembershipStatus {
    fn from(status: house::MembershipStatus) -> Self {
        match status {
            house::MembershipStatus::Active => Self::Active,
            house::MembershipStatus::Inactive => Self::Inactive,
        }
    }
}

impl From<db::PeriodStatus> for period::PeriodStatus {
    fn from(status: db::PeriodStatus) -> Self {
        match status {
            db::PeriodStatus::Draft => Self::Draft,
            db::PeriodStatus::Locked => Self::Locked,
        }
    }
}

impl From<period::PeriodStatus> for db::PeriodStatus {
    fn from(status: period::PeriodStatus) -> Self {
        match status {
            period::PeriodStatus::Draft => Self::Draft,
            period::PeriodStatus::Locked => Self::Locked,
        }
    }
}

// ============================================================================
// Houses
// ============================================================================

impl From<houses::Model> for House {
    fn from(model: houses::Model) -> Self {
        Self {
            id: model.id.into(),
            code: model.code,
            status: model.status.into(),
            created_at: utc(model.created_at),
        }
    }
}

impl From<&House> for houses::ActiveModel {
    fn from(house: &House) -> Self {
        Self {
            id: Set(house.id.into_inner()),
            code: Set(house.code.clone()),
            status: Set(house.status.into()),
            created_at: Set(tz(house.created_at)),
        }
    }
}

impl From<resident_memberships::Model> for ResidentMembership {
    fn from(model: resident_memberships::Model) -> Self {
        Self {
            id: model.id.into(),
            house_id: model.house_id.into(),
            user_id: model.user_id.into(),
            role: model.role.into(),
            status: model.status.into(),
            created_at: utc(model.created_at),
        }
    }
}

impl From<&ResidentMembership> for resident_memberships::ActiveModel {
    fn from(membership: &ResidentMembership) -> Self {
        Self {
            id: Set(membership.id.into_inner()),
            house_id: Set(membership.house_id.into_inner()),
            user_id: Set(membership.user_id.into_inner()),
            role: Set(membership.role.into()),
            status: Set(membership.status.into()),
            created_at: Set(tz(membership.created_at)),
        }
    }
}

// ============================================================================
// Pay-ins & bank transactions
// ============================================================================

impl TryFrom<pay_ins::Model> for PayIn {
    type Error = CoreError;

    fn try_from(model: pay_ins::Model) -> Result<Self, Self::Error> {
        let hour = u32::try_from(model.claimed_hour)
            .map_err(|_| out_of_range("claimed_hour", model.claimed_hour))?;
        let minute = u32::try_from(model.claimed_minute)
            .map_err(|_| out_of_range("claimed_minute", model.claimed_minute))?;

        Ok(Self {
            id: model.id.into(),
            house_id: model.house_id.into(),
            amount: Money::new(model.amount),
            claimed: ClaimedTransfer::new(model.claimed_date, hour, minute),
            transfer_at: utc(model.transfer_at),
            source: model.source.into(),
            status: model.status.into(),
            matched_bank_transaction_id: model.matched_bank_transaction_id.map(Into::into),
            matched_by: model.matched_by.map(Into::into),
            matched_at: model.matched_at.map(utc),
            rejection_reason: model.rejection_reason,
            created_by: model.created_by.into(),
            accepted_by: model.accepted_by.map(Into::into),
            accepted_at: model.accepted_at.map(utc),
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
            version: model.version,
        })
    }
}

impl TryFrom<&PayIn> for pay_ins::ActiveModel {
    type Error = CoreError;

    fn try_from(pay_in: &PayIn) -> Result<Self, Self::Error> {
        let hour = i16::try_from(pay_in.claimed.hour)
            .map_err(|_| CoreError::Validation(format!("Invalid hour {}", pay_in.claimed.hour)))?;
        let minute = i16::try_from(pay_in.claimed.minute).map_err(|_| {
            CoreError::Validation(format!("Invalid minute {}", pay_in.claimed.minute))
        })?;

        Ok(Self {
            id: Set(pay_in.id.into_inner()),
            house_id: Set(pay_in.house_id.into_inner()),
            amount: Set(pay_in.amount.amount()),
            claimed_date: Set(pay_in.claimed.date),
            claimed_hour: Set(hour),
            claimed_minute: Set(minute),
            transfer_at: Set(tz(pay_in.transfer_at)),
            source: Set(pay_in.source.into()),
            status: Set(pay_in.status.into()),
            matched_bank_transaction_id: Set(pay_in
                .matched_bank_transaction_id
                .map(|id| id.into_inner())),
            matched_by: Set(pay_in.matched_by.map(|id| id.into_inner())),
            matched_at: Set(pay_in.matched_at.map(tz)),
            rejection_reason: Set(pay_in.rejection_reason.clone()),
            created_by: Set(pay_in.created_by.into_inner()),
            accepted_by: Set(pay_in.accepted_by.map(|id| id.into_inner())),
            accepted_at: Set(pay_in.accepted_at.map(tz)),
            created_at: Set(tz(pay_in.created_at)),
            updated_at: Set(tz(pay_in.updated_at)),
            version: Set(pay_in.version),
        })
    }
}

impl From<bank_transactions::Model> for BankTransaction {
    fn from(model: bank_transactions::Model) -> Self {
        Self {
            id: model.id.into(),
            effective_at: utc(model.effective_at),
            credit: model.credit.map(Money::new),
            debit: model.debit.map(Money::new),
            description: model.description,
            bank_reference: model.bank_reference,
            matched_pay_in_id: model.matched_pay_in_id.map(Into::into),
            imported_at: utc(model.imported_at),
        }
    }
}

impl From<&BankTransaction> for bank_transactions::ActiveModel {
    fn from(txn: &BankTransaction) -> Self {
        Self {
            id: Set(txn.id.into_inner()),
            effective_at: Set(tz(txn.effective_at)),
            credit: Set(txn.credit.map(|m| m.amount())),
            debit: Set(txn.debit.map(|m| m.amount())),
            description: Set(txn.description.clone()),
            bank_reference: Set(txn.bank_reference.clone()),
            matched_pay_in_id: Set(txn.matched_pay_in_id.map(|id| id.into_inner())),
            imported_at: Set(tz(txn.imported_at)),
        }
    }
}

// ============================================================================
// Ledger
// ============================================================================

impl From<income_transactions::Model> for IncomeTransaction {
    fn from(model: income_transactions::Model) -> Self {
        Self {
            id: model.id.into(),
            house_id: model.house_id.into(),
            pay_in_id: model.pay_in_id.into(),
            amount: Money::new(model.amount),
            received_on: model.received_on,
            posted_by: model.posted_by.into(),
            created_at: utc(model.created_at),
        }
    }
}

impl From<&IncomeTransaction> for income_transactions::ActiveModel {
    fn from(income: &IncomeTransaction) -> Self {
        Self {
            id: Set(income.id.into_inner()),
            house_id: Set(income.house_id.into_inner()),
            pay_in_id: Set(income.pay_in_id.into_inner()),
            amount: Set(income.amount.amount()),
            received_on: Set(income.received_on),
            posted_by: Set(income.posted_by.into_inner()),
            created_at: Set(tz(income.created_at)),
        }
    }
}

impl From<invoices::Model> for Invoice {
    fn from(model: invoices::Model) -> Self {
        Self {
            id: model.id.into(),
            house_id: model.house_id.into(),
            total_amount: Money::new(model.total_amount),
            issued_on: model.issued_on,
            due_on: model.due_on,
            created_at: utc(model.created_at),
        }
    }
}

impl From<&Invoice> for invoices::ActiveModel {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: Set(invoice.id.into_inner()),
            house_id: Set(invoice.house_id.into_inner()),
            total_amount: Set(invoice.total_amount.amount()),
            issued_on: Set(invoice.issued_on),
            due_on: Set(invoice.due_on),
            created_at: Set(tz(invoice.created_at)),
        }
    }
}

impl From<credit_notes::Model> for CreditNote {
    fn from(model: credit_notes::Model) -> Self {
        Self {
            id: model.id.into(),
            invoice_id: model.invoice_id.into(),
            amount: Money::new(model.amount),
            reason: model.reason,
            is_full_credit: model.is_full_credit,
            issued_by: model.issued_by.into(),
            issued_at: utc(model.issued_at),
        }
    }
}

impl From<&CreditNote> for credit_notes::ActiveModel {
    fn from(note: &CreditNote) -> Self {
        Self {
            id: Set(note.id.into_inner()),
            invoice_id: Set(note.invoice_id.into_inner()),
            amount: Set(note.amount.amount()),
            reason: Set(note.reason.clone()),
            is_full_credit: Set(note.is_full_credit),
            issued_by: Set(note.issued_by.into_inner()),
            issued_at: Set(tz(note.issued_at)),
        }
    }
}

// ============================================================================
// Periods
// ============================================================================

impl TryFrom<period_snapshots::Model> for PeriodSnapshot {
    type Error = CoreError;

    fn try_from(model: period_snapshots::Model) -> Result<Self, Self::Error> {
        let month = u32::try_from(model.month).map_err(|_| out_of_range("month", model.month))?;
        let period = YearMonth::new(model.year, month)
            .map_err(|_| out_of_range("period", format!("{}-{}", model.year, model.month)))?;

        Ok(Self {
            id: model.id.into(),
            period,
            status: model.status.into(),
            income_total: Money::new(model.income_total),
            credit_note_total: Money::new(model.credit_note_total),
            locked_at: model.locked_at.map(utc),
            locked_by: model.locked_by.map(Into::into),
            created_at: utc(model.created_at),
        })
    }
}

impl From<&PeriodSnapshot> for period_snapshots::ActiveModel {
    fn from(snapshot: &PeriodSnapshot) -> Self {
        Self {
            id: Set(snapshot.id.into_inner()),
            year: Set(snapshot.period.year()),
            month: Set(i32::try_from(snapshot.period.month()).unwrap_or_default()),
            status: Set(snapshot.status.into()),
            income_total: Set(snapshot.income_total.amount()),
            credit_note_total: Set(snapshot.credit_note_total.amount()),
            locked_at: Set(snapshot.locked_at.map(tz)),
            locked_by: Set(snapshot.locked_by.map(|id| id.into_inner())),
            created_at: Set(tz(snapshot.created_at)),
        }
    }
}

impl From<period_unlock_logs::Model> for PeriodUnlockLog {
    fn from(model: period_unlock_logs::Model) -> Self {
        Self {
            id: model.id.into(),
            snapshot_id: model.snapshot_id.into(),
            previous_status: model.previous_status.into(),
            reason: model.reason,
            unlocked_by: model.unlocked_by.into(),
            unlocked_at: utc(model.unlocked_at),
        }
    }
}

impl From<&PeriodUnlockLog> for period_unlock_logs::ActiveModel {
    fn from(log: &PeriodUnlockLog) -> Self {
        Self {
            id: Set(log.id.into_inner()),
            snapshot_id: Set(log.snapshot_id.into_inner()),
            previous_status: Set(log.previous_status.into()),
            reason: Set(log.reason.clone()),
            unlocked_by: Set(log.unlocked_by.into_inner()),
            unlocked_at: Set(tz(log.unlocked_at)),
        }
    }
}
