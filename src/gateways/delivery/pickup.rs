use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    entities::{Carrier, CarrierCityModel, CarrierRegionModel, PickupPointModel},
    errors::ServiceError,
};

use super::{
    active_pickup_point, cached_cities, cached_pickup_points, cached_regions, DeliveryGateway,
    ShipmentReceipt, ShipmentRequest,
};

/// Self-pickup carrier adapter. There is no external network: points are
/// seeded by the store operator and shipment creation is a local validation
/// that the chosen point exists and is active.
pub struct PickupGateway {
    db: Arc<DatabaseConnection>,
}

impl PickupGateway {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeliveryGateway for PickupGateway {
    fn carrier(&self) -> Carrier {
        Carrier::Pickup
    }

    async fn list_regions(&self) -> Result<Vec<CarrierRegionModel>, ServiceError> {
        cached_regions(&self.db, self.carrier()).await
    }

    async fn list_cities(&self, region_id: Uuid) -> Result<Vec<CarrierCityModel>, ServiceError> {
        cached_cities(&self.db, self.carrier(), region_id).await
    }

    async fn list_pickup_points(
        &self,
        city_id: Uuid,
    ) -> Result<Vec<PickupPointModel>, ServiceError> {
        cached_pickup_points(&self.db, self.carrier(), city_id).await
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest<'_>,
    ) -> Result<ShipmentReceipt, ServiceError> {
        let point = active_pickup_point(&self.db, self.carrier(), request.pickup_point_id).await?;

        Ok(ShipmentReceipt {
            pickup_point_id: point.id,
            tracking_number: None,
        })
    }
}
