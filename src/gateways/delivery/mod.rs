use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::{
        carrier_city, carrier_region, pickup_point, Carrier, CarrierCity, CarrierCityModel,
        CarrierRegion, CarrierRegionModel, PickupPoint, PickupPointModel,
    },
    errors::ServiceError,
};

pub mod nova_poshta;
pub mod pickup;

pub use nova_poshta::{NovaPoshtaClient, NovaPoshtaGateway};
pub use pickup::PickupGateway;

/// Recipient contact snapshot taken at checkout time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, validator::Validate)]
pub struct ContactInfo {
    #[validate(length(min = 1))]
    pub full_name: String,
    #[validate(length(min = 1))]
    pub phone: String,
}

/// What a carrier needs to book (or validate) a shipment before the order
/// row exists.
#[derive(Debug, Clone)]
pub struct ShipmentRequest<'a> {
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub pickup_point_id: Uuid,
    pub contact: &'a ContactInfo,
}

/// Carrier response to a shipment request. Tracking numbers are assigned by
/// the carrier later for carriers that do not book programmatically.
#[derive(Debug, Clone)]
pub struct ShipmentReceipt {
    pub pickup_point_id: Uuid,
    pub tracking_number: Option<String>,
}

/// Contract every delivery carrier adapter implements.
///
/// The listing operations read the local reference cache only, keeping
/// checkout-time lookups off the carrier network; `create_shipment` may call
/// out for carriers with programmatic booking.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    fn carrier(&self) -> Carrier;

    async fn list_regions(&self) -> Result<Vec<CarrierRegionModel>, ServiceError>;

    async fn list_cities(&self, region_id: Uuid) -> Result<Vec<CarrierCityModel>, ServiceError>;

    async fn list_pickup_points(
        &self,
        city_id: Uuid,
    ) -> Result<Vec<PickupPointModel>, ServiceError>;

    async fn create_shipment(
        &self,
        request: &ShipmentRequest<'_>,
    ) -> Result<ShipmentReceipt, ServiceError>;
}

/// Static registry resolving a carrier enum to its adapter; pure lookup,
/// built once at process start.
pub struct DeliveryGatewayFactory {
    registry: HashMap<Carrier, Arc<dyn DeliveryGateway>>,
}

impl DeliveryGatewayFactory {
    pub fn from_config(
        db: Arc<DatabaseConnection>,
        cfg: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let client = NovaPoshtaClient::new(
            cfg.nova_poshta_api_key.clone(),
            cfg.nova_poshta_api_url.clone(),
            Duration::from_secs(cfg.gateway_timeout_secs),
        )?;

        let mut registry: HashMap<Carrier, Arc<dyn DeliveryGateway>> = HashMap::new();
        registry.insert(
            Carrier::NovaPoshta,
            Arc::new(NovaPoshtaGateway::new(db.clone(), client)),
        );
        registry.insert(Carrier::Pickup, Arc::new(PickupGateway::new(db)));
        Ok(Self { registry })
    }

    /// Registry from explicit adapters, for wiring test doubles.
    pub fn with_registry(registry: HashMap<Carrier, Arc<dyn DeliveryGateway>>) -> Self {
        Self { registry }
    }

    /// Parses a carrier name from the wire into the closed enum.
    pub fn parse_carrier(name: &str) -> Result<Carrier, ServiceError> {
        name.parse::<Carrier>()
            .map_err(|_| ServiceError::UnsupportedGateway(name.to_string()))
    }

    pub fn resolve(&self, carrier: Carrier) -> Result<Arc<dyn DeliveryGateway>, ServiceError> {
        self.registry
            .get(&carrier)
            .cloned()
            .ok_or_else(|| ServiceError::UnsupportedGateway(carrier.to_string()))
    }
}

// Cache readers shared by the carrier adapters. Reference rows are written
// only by the synchronizer; readers never wait on it.

pub(crate) async fn cached_regions(
    db: &DatabaseConnection,
    carrier: Carrier,
) -> Result<Vec<CarrierRegionModel>, ServiceError> {
    Ok(CarrierRegion::find()
        .filter(carrier_region::Column::Carrier.eq(carrier))
        .order_by_asc(carrier_region::Column::Name)
        .all(db)
        .await?)
}

pub(crate) async fn cached_cities(
    db: &DatabaseConnection,
    carrier: Carrier,
    region_id: Uuid,
) -> Result<Vec<CarrierCityModel>, ServiceError> {
    Ok(CarrierCity::find()
        .filter(carrier_city::Column::Carrier.eq(carrier))
        .filter(carrier_city::Column::RegionId.eq(region_id))
        .order_by_asc(carrier_city::Column::Name)
        .all(db)
        .await?)
}

pub(crate) async fn cached_pickup_points(
    db: &DatabaseConnection,
    carrier: Carrier,
    city_id: Uuid,
) -> Result<Vec<PickupPointModel>, ServiceError> {
    Ok(PickupPoint::find()
        .filter(pickup_point::Column::Carrier.eq(carrier))
        .filter(pickup_point::Column::CityId.eq(city_id))
        .filter(pickup_point::Column::IsActive.eq(true))
        .order_by_asc(pickup_point::Column::OfficeNumber)
        .all(db)
        .await?)
}

/// Looks up an active pickup point belonging to the given carrier; used by
/// adapters to validate the checkout destination.
pub(crate) async fn active_pickup_point(
    db: &DatabaseConnection,
    carrier: Carrier,
    pickup_point_id: Uuid,
) -> Result<PickupPointModel, ServiceError> {
    let point = PickupPoint::find_by_id(pickup_point_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("Pickup point {} not found", pickup_point_id))
        })?;

    if point.carrier != carrier || !point.is_active {
        return Err(ServiceError::ValidationError(format!(
            "Pickup point {} is not available for carrier {}",
            pickup_point_id, carrier
        )));
    }

    Ok(point)
}
