//! `SeaORM` Entity for houses table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::HouseStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "houses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub status: HouseStatus,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::resident_memberships::Entity")]
    ResidentMemberships,
    #[sea_orm(has_many = "super::pay_ins::Entity")]
    PayIns,
    #[sea_orm(has_many = "super::invoices::Entity")]
    Invoices,
}

impl Related<super::resident_memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResidentMemberships.def()
    }
}

impl Related<super::pay_ins::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PayIns.def()
    }
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
