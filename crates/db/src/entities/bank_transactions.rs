//! `SeaORM` Entity for bank_transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub effective_at: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))", nullable)]
    pub credit: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))", nullable)]
    pub debit: Option<Decimal>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub bank_reference: Option<String>,
    #[sea_orm(unique)]
    pub matched_pay_in_id: Option<Uuid>,
    pub imported_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pay_ins::Entity",
        from = "Column::MatchedPayInId",
        to = "super::pay_ins::Column::Id"
    )]
    PayIns,
}

impl Related<super::pay_ins::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PayIns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
