use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Delivery record for an order (one per order). Holds the chosen carrier,
/// the destination pickup point and a snapshot of the recipient contact.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub carrier: Carrier,
    pub pickup_point_id: Uuid,
    pub recipient_name: String,
    pub recipient_phone: String,
    #[sea_orm(nullable)]
    pub tracking_number: Option<String>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::pickup_point::Entity",
        from = "Column::PickupPointId",
        to = "super::pickup_point::Column::Id"
    )]
    PickupPoint,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::pickup_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickupPoint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Supported delivery carriers. Closed set: adding a carrier means adding a
/// gateway adapter and registering it in the delivery factory.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    #[sea_orm(string_value = "nova_poshta")]
    NovaPoshta,
    #[sea_orm(string_value = "pickup")]
    Pickup,
}

/// Delivery status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "created_with_carrier")]
    CreatedWithCarrier,
    #[sea_orm(string_value = "failed")]
    Failed,
}
