//! `SeaORM` Entity for income_transactions table.
//!
//! Rows are append-only; a trigger rejects UPDATE and DELETE.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "income_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub house_id: Uuid,
    #[sea_orm(unique)]
    pub pay_in_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub amount: Decimal,
    pub received_on: Date,
    pub posted_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pay_ins::Entity",
        from = "Column::PayInId",
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
