//! `SeaORM` Entity for pay_ins table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{PayInSource, PayInStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "pay_ins")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub house_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub amount: Decimal,
    pub claimed_date: Date,
    pub claimed_hour: i16,
    pub claimed_minute: i16,
    pub transfer_at: DateTimeWithTimeZone,
    pub source: PayInSource,
    pub status: PayInStatus,
    #[sea_orm(unique)]
    pub matched_bank_transaction_id: Option<Uuid>,
    pub matched_by: Option<Uuid>,
    pub matched_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,
    pub created_by: Uuid,
    pub accepted_by: Option<Uuid>,
    pub accepted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::houses::Entity",
        from = "Column::HouseId",
        to = "super::houses::Column::Id"
    )]
    Houses,
    #[sea_orm(
        belongs_to = "super::bank_transactions::Entity",
        from = "Column::MatchedBankTransactionId",
        to = "super::bank_transactions::Column::Id"
    )]
    BankTransactions,
    #[sea_orm(has_one = "super::income_transactions::Entity")]
    IncomeTransactions,
}

impl Related<super::houses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Houses.def()
    }
}

impl Related<super::bank_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankTransactions.def()
    }
}

impl Related<super::income_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IncomeTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
