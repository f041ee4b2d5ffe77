//! Postgres implementation of the core storage seam.
//!
//! Each unit of work is one database transaction. Dropping it without
//! commit rolls back. Uniqueness of match links, income rows and period
//! snapshots is enforced by constraints from the initial migration, and
//! pay-in transitions are conditional on status and version, so a racing
//! writer fails with the same error the in-memory store raises. Month holds
//! are transaction-scoped advisory locks taken through `hold_period()`.

mod convert;
mod error;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
};
use tracing::{debug, warn};
use uuid::Uuid;

use moobaan_core::bank::BankTransaction;
use moobaan_core::credit::{CreditNote, Invoice};
use moobaan_core::house::{House, ResidentMembership};
use moobaan_core::ledger::IncomeTransaction;
use moobaan_core::payin::PayIn;
use moobaan_core::period::{PeriodSnapshot, PeriodStatus, PeriodUnlockLog, YearMonth};
use moobaan_core::store::{BillingStore, PeriodAccess, UnitOfWork};
use moobaan_core::{CoreError, CoreResult};
use moobaan_shared::types::{
    BankTransactionId, HouseId, InvoiceId, PayInId, PeriodSnapshotId,
};

use crate::entities::sea_orm_active_enums as db;
use crate::entities::{
    bank_transactions, credit_notes, houses, income_transactions, invoices, pay_ins,
    period_snapshots, period_unlock_logs, resident_memberships,
};

use convert::{stored_statuses, tz};
use error::{BANK_MATCH_CONSTRAINT, db_error, INCOME_PAY_IN_CONSTRAINT, PAY_IN_MATCH_CONSTRAINT, violates};

/// Matches any of `statuses`.
fn status_in(statuses: impl IntoIterator<Item = db::PayInStatus>) -> Condition {
    statuses
        .into_iter()
        .fold(Condition::any(), |cond, status| cond.add(pay_ins::Column::Status.eq(status)))
}

fn month_column(period: YearMonth) -> CoreResult<i32> {
    i32::try_from(period.month()).map_err(|_| CoreError::Validation(format!("Invalid month in {period}")))
}

/// Store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Creates a store over an established connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl BillingStore for PgStore {
    type Uow = PgUnitOfWork;

    async fn begin(&self) -> CoreResult<Self::Uow> {
        let txn = self.db.begin().await.map_err(db_error)?;
        Ok(PgUnitOfWork { txn })
    }
}

/// Unit of work over one Postgres transaction.
pub struct PgUnitOfWork {
    txn: DatabaseTransaction,
}

impl PgUnitOfWork {
    async fn ensure_bank_transaction(&self, id: BankTransactionId) -> CoreResult<()> {
        bank_transactions::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| CoreError::not_found("bank transaction", id))?;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn house(&mut self, id: HouseId) -> CoreResult<Option<House>> {
        let model = houses::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(model.map(Into::into))
    }

    async fn insert_house(&mut self, house: &House) -> CoreResult<()> {
        houses::Entity::insert(houses::ActiveModel::from(house))
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn memberships_for_house(&mut self, house_id: HouseId) -> CoreResult<Vec<ResidentMembership>> {
        let models = resident_memberships::Entity::find()
            .filter(resident_memberships::Column::HouseId.eq(house_id.into_inner()))
            .order_by_asc(resident_memberships::Column::CreatedAt)
            .all(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_membership(&mut self, membership: &ResidentMembership) -> CoreResult<()> {
        resident_memberships::Entity::insert(resident_memberships::ActiveModel::from(membership))
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn pay_in(&mut self, id: PayInId) -> CoreResult<Option<PayIn>> {
        pay_ins::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_error)?
            .map(PayIn::try_from)
            .transpose()
    }

    async fn open_pay_ins(&mut self) -> CoreResult<Vec<PayIn>> {
        pay_ins::Entity::find()
            .filter(status_in([
                db::PayInStatus::Pending,
                db::PayInStatus::Submitted,
                db::PayInStatus::RejectedNeedsFix,
            ]))
            .filter(pay_ins::Column::MatchedBankTransactionId.is_null())
            .order_by_asc(pay_ins::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(PayIn::try_from)
            .collect()
    }

    async fn insert_pay_in(&mut self, pay_in: &PayIn) -> CoreResult<()> {
        pay_ins::Entity::insert(pay_ins::ActiveModel::try_from(pay_in)?)
            .exec_without_returning(&self.txn)
            .await
            .map_err(|err| match pay_in.matched_bank_transaction_id {
                Some(bank_transaction_id) if violates(&err, PAY_IN_MATCH_CONSTRAINT) => {
                    CoreError::AlreadyMatched {
                        pay_in_id: pay_in.id,
                        bank_transaction_id,
                    }
                }
                _ => db_error(err),
            })?;
        Ok(())
    }

    async fn update_pay_in(&mut self, pay_in: &PayIn, expected: &PayIn) -> CoreResult<()> {
        let result = pay_ins::Entity::update_many()
            .set(pay_ins::ActiveModel::try_from(pay_in)?)
            .filter(pay_ins::Column::Id.eq(pay_in.id.into_inner()))
            .filter(status_in(stored_statuses(expected.status)))
            .filter(pay_ins::Column::Version.eq(expected.version))
            .exec(&self.txn)
            .await
            .map_err(|err| match pay_in.matched_bank_transaction_id {
                Some(bank_transaction_id) if violates(&err, PAY_IN_MATCH_CONSTRAINT) => {
                    CoreError::AlreadyMatched {
                        pay_in_id: pay_in.id,
                        bank_transaction_id,
                    }
                }
                _ => db_error(err),
            })?;

        if result.rows_affected == 0 {
            let stored = self
                .pay_in(pay_in.id)
                .await?
                .ok_or_else(|| CoreError::not_found("pay-in", pay_in.id))?;
            warn!(
                pay_in_id = %pay_in.id,
                stored_status = %stored.status,
                stored_version = stored.version,
                expected_status = %expected.status,
                expected_version = expected.version,
                "pay-in update lost a race"
            );
            return Err(CoreError::Conflict(format!(
                "Pay-in {} is {} at version {}, expected {} at version {}",
                pay_in.id, stored.status, stored.version, expected.status, expected.version
            )));
        }
        Ok(())
    }

    async fn bank_transaction(&mut self, id: BankTransactionId) -> CoreResult<Option<BankTransaction>> {
        let model = bank_transactions::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(model.map(Into::into))
    }

    async fn unmatched_credits(&mut self) -> CoreResult<Vec<BankTransaction>> {
        let models = bank_transactions::Entity::find()
            .filter(bank_transactions::Column::Credit.is_not_null())
            .filter(bank_transactions::Column::MatchedPayInId.is_null())
            .order_by_asc(bank_transactions::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_bank_transaction(&mut self, transaction: &BankTransaction) -> CoreResult<()> {
        bank_transactions::Entity::insert(bank_transactions::ActiveModel::from(transaction))
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn claim_bank_transaction(
        &mut self,
        id: BankTransactionId,
        pay_in_id: PayInId,
    ) -> CoreResult<()> {
        let already_matched = CoreError::AlreadyMatched {
            pay_in_id,
            bank_transaction_id: id,
        };
        let result = bank_transactions::Entity::update_many()
            .col_expr(
                bank_transactions::Column::MatchedPayInId,
                Expr::value(pay_in_id.into_inner()),
            )
            .filter(bank_transactions::Column::Id.eq(id.into_inner()))
            .filter(bank_transactions::Column::MatchedPayInId.is_null())
            .exec(&self.txn)
            .await
            .map_err(|err| {
                if violates(&err, BANK_MATCH_CONSTRAINT) {
                    already_matched.clone()
                } else {
                    db_error(err)
                }
            })?;

        if result.rows_affected == 0 {
            self.ensure_bank_transaction(id).await?;
            return Err(already_matched);
        }
        Ok(())
    }

    async fn release_bank_transaction(
        &mut self,
        id: BankTransactionId,
        pay_in_id: PayInId,
    ) -> CoreResult<()> {
        let result = bank_transactions::Entity::update_many()
            .col_expr(
                bank_transactions::Column::MatchedPayInId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(bank_transactions::Column::Id.eq(id.into_inner()))
            .filter(bank_transactions::Column::MatchedPayInId.eq(pay_in_id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(db_error)?;

        if result.rows_affected == 0 {
            self.ensure_bank_transaction(id).await?;
            return Err(CoreError::Conflict(format!(
                "Bank transaction {id} is not matched to pay-in {pay_in_id}"
            )));
        }
        Ok(())
    }

    async fn incomes_for_pay_in(&mut self, pay_in_id: PayInId) -> CoreResult<Vec<IncomeTransaction>> {
        let models = income_transactions::Entity::find()
            .filter(income_transactions::Column::PayInId.eq(pay_in_id.into_inner()))
            .order_by_asc(income_transactions::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn incomes_received_between(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CoreResult<Vec<IncomeTransaction>> {
        let models = income_transactions::Entity::find()
            .filter(income_transactions::Column::ReceivedOn.between(from, to))
            .order_by_asc(income_transactions::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_income(&mut self, income: &IncomeTransaction) -> CoreResult<()> {
        income_transactions::Entity::insert(income_transactions::ActiveModel::from(income))
            .exec_without_returning(&self.txn)
            .await
            .map_err(|err| {
                if violates(&err, INCOME_PAY_IN_CONSTRAINT) {
                    CoreError::DuplicatePosting {
                        pay_in_id: income.pay_in_id,
                    }
                } else {
                    db_error(err)
                }
            })?;
        Ok(())
    }

    async fn invoice(&mut self, id: InvoiceId) -> CoreResult<Option<Invoice>> {
        let model = invoices::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(model.map(Into::into))
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> CoreResult<()> {
        invoices::Entity::insert(invoices::ActiveModel::from(invoice))
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn credit_notes_for_invoice(&mut self, invoice_id: InvoiceId) -> CoreResult<Vec<CreditNote>> {
        let models = credit_notes::Entity::find()
            .filter(credit_notes::Column::InvoiceId.eq(invoice_id.into_inner()))
            .order_by_asc(credit_notes::Column::IssuedAt)
            .order_by_asc(credit_notes::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_credit_note(&mut self, note: &CreditNote) -> CoreResult<()> {
        credit_notes::Entity::insert(credit_notes::ActiveModel::from(note))
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn credit_notes_issued_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<CreditNote>> {
        let models = credit_notes::Entity::find()
            .filter(credit_notes::Column::IssuedAt.gte(tz(from)))
            .filter(credit_notes::Column::IssuedAt.lt(tz(to)))
            .order_by_asc(credit_notes::Column::IssuedAt)
            .all(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn hold_period(
        &mut self,
        period: YearMonth,
        access: PeriodAccess,
    ) -> CoreResult<Option<PeriodSnapshot>> {
        let exclusive = access == PeriodAccess::Lock;
        self.txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT hold_period($1, $2, $3)",
                [period.year().into(), month_column(period)?.into(), exclusive.into()],
            ))
            .await
            .map_err(db_error)?;
        debug!(%period, ?access, "period held");
        self.period_snapshot(period).await
    }

    async fn period_snapshot(&mut self, period: YearMonth) -> CoreResult<Option<PeriodSnapshot>> {
        let month = month_column(period)?;
        period_snapshots::Entity::find()
            .filter(period_snapshots::Column::Year.eq(period.year()))
            .filter(period_snapshots::Column::Month.eq(month))
            .one(&self.txn)
            .await
            .map_err(db_error)?
            .map(PeriodSnapshot::try_from)
            .transpose()
    }

    async fn period_snapshot_by_id(&mut self, id: PeriodSnapshotId) -> CoreResult<Option<PeriodSnapshot>> {
        period_snapshots::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_error)?
            .map(PeriodSnapshot::try_from)
            .transpose()
    }

    async fn save_period_snapshot(
        &mut self,
        snapshot: &PeriodSnapshot,
        expected: Option<PeriodStatus>,
    ) -> CoreResult<()> {
        let model = period_snapshots::ActiveModel::from(snapshot);
        let Some(expected) = expected else {
            period_snapshots::Entity::insert(model)
                .exec_without_returning(&self.txn)
                .await
                .map_err(db_error)?;
            return Ok(());
        };

        let result = period_snapshots::Entity::update_many()
            .set(model)
            .filter(period_snapshots::Column::Id.eq(snapshot.id.into_inner()))
            .filter(period_snapshots::Column::Status.eq(db::PeriodStatus::from(expected)))
            .exec(&self.txn)
            .await
            .map_err(db_error)?;

        if result.rows_affected == 0 {
            let stored = self
                .period_snapshot_by_id(snapshot.id)
                .await?
                .ok_or_else(|| CoreError::not_found("period snapshot", snapshot.id))?;
            return Err(CoreError::Conflict(format!(
                "Period {} is {}, expected {expected}",
                stored.period, stored.status
            )));
        }
        Ok(())
    }

    async fn insert_unlock_log(&mut self, log: &PeriodUnlockLog) -> CoreResult<()> {
        period_unlock_logs::Entity::insert(period_unlock_logs::ActiveModel::from(log))
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn unlock_logs(&mut self, snapshot_id: PeriodSnapshotId) -> CoreResult<Vec<PeriodUnlockLog>> {
        let models = period_unlock_logs::Entity::find()
            .filter(period_unlock_logs::Column::SnapshotId.eq(snapshot_id.into_inner()))
            .order_by_asc(period_unlock_logs::Column::UnlockedAt)
            .order_by_asc(period_unlock_logs::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn commit(self) -> CoreResult<()> {
        self.txn.commit().await.map_err(db_error)?;
        debug!("unit of work committed");
        Ok(())
    }
}
