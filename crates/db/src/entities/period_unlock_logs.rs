//! `SeaORM` Entity for period_unlock_logs table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PeriodStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "period_unlock_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub snapshot_id: Uuid,
    pub previous_status: PeriodStatus,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub unlocked_by: Uuid,
    pub unlocked_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::period_snapshots::Entity",
        from = "Column::SnapshotId",
        to = "super::period_snapshots::Column::Id"
    )]
    PeriodSnapshots,
}

impl Related<super::period_snapshots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PeriodSnapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
