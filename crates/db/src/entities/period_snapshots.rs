//! `SeaORM` Entity for period_snapshots table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PeriodStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "period_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub year: i32,
    pub month: i32,
    pub status: PeriodStatus,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub income_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub credit_note_total: Decimal,
    pub locked_at: Option<DateTimeWithTimeZone>,
    pub locked_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::period_unlock_logs::Entity")]
    PeriodUnlockLogs,
}

impl Related<super::period_unlock_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PeriodUnlockLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
