use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delivery::Carrier;

/// Cached pickup point / carrier office within a city. For network-backed
/// carriers these rows come from the synchronizer; for self-pickup they are
/// seeded by the store operator. Inactive points are kept but not offered.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carrier_pickup_points")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub city_id: Uuid,
    pub carrier: Carrier,
    pub address_line: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub office_number: i32,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    pub is_active: bool,
    pub external_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::carrier_city::Entity",
        from = "Column::CityId",
        to = "super::carrier_city::Column::Id"
    )]
    City,
    #[sea_orm(has_many = "super::delivery::Entity")]
    Deliveries,
}

impl Related<super::carrier_city::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::City.def()
    }
}

impl Related<super::delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deliveries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
