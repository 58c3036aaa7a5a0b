use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delivery::Carrier;

/// Cached carrier city, linked to its region. Synchronizer-owned.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carrier_cities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub region_id: Uuid,
    pub carrier: Carrier,
    pub name: String,
    #[sea_orm(nullable)]
    pub settlement_type: Option<String>,
    pub external_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::carrier_region::Entity",
        from = "Column::RegionId",
        to = "super::carrier_region::Column::Id"
    )]
    Region,
    #[sea_orm(has_many = "super::pickup_point::Entity")]
    PickupPoints,
}

impl Related<super::carrier_region::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Region.def()
    }
}

impl Related<super::pickup_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickupPoints.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
