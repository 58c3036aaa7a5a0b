use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    entities::{Carrier, CarrierCityModel, CarrierRegionModel, PickupPointModel},
    errors::ServiceError,
};

use super::{
    active_pickup_point, cached_cities, cached_pickup_points, cached_regions, DeliveryGateway,
    ShipmentReceipt, ShipmentRequest,
};

/// HTTP client for the Nova Poshta JSON API. Every call posts
/// `{apiKey, modelName, calledMethod, methodProperties}` to a single
/// endpoint and reads the `data` array out of the response envelope.
#[derive(Clone)]
pub struct NovaPoshtaClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NovaPoshtaClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    async fn post(
        &self,
        model: &str,
        method: &str,
        properties: Value,
    ) -> Result<Vec<Value>, ServiceError> {
        let payload = json!({
            "apiKey": self.api_key,
            "modelName": model,
            "calledMethod": method,
            "methodProperties": properties,
        });

        let response = self
            .http
            .post(&self.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::gateway("nova poshta request failed", e))?
            .error_for_status()
            .map_err(|e| ServiceError::gateway("nova poshta rejected request", e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::gateway("nova poshta returned invalid json", e))?;

        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Fetches all areas in one call.
    pub async fn get_areas(&self) -> Result<Vec<Value>, ServiceError> {
        self.post("AddressGeneral", "getAreas", json!({})).await
    }

    /// Fetches the full city list, walking pages until a short batch.
    pub async fn get_cities(&self, limit: u32) -> Result<Vec<Value>, ServiceError> {
        self.paginated("getCities", limit).await
    }

    /// Fetches the full warehouse list, walking pages until a short batch.
    pub async fn get_warehouses(&self, limit: u32) -> Result<Vec<Value>, ServiceError> {
        self.paginated("getWarehouses", limit).await
    }

    async fn paginated(&self, method: &str, limit: u32) -> Result<Vec<Value>, ServiceError> {
        let mut page = 1u32;
        let mut all = Vec::new();

        loop {
            let batch = self
                .post(
                    "AddressGeneral",
                    method,
                    json!({ "Limit": limit.to_string(), "Page": page.to_string() }),
                )
                .await?;

            if batch.is_empty() {
                break;
            }
            let short_batch = batch.len() < limit as usize;
            all.extend(batch);
            if short_batch {
                break;
            }
            page += 1;
        }

        Ok(all)
    }
}

/// Nova Poshta carrier adapter. Listings come from the local reference
/// cache; shipment creation validates the destination against the cache and
/// leaves the tracking number to the carrier (assigned when the parcel is
/// registered on their side).
pub struct NovaPoshtaGateway {
    db: Arc<DatabaseConnection>,
    client: NovaPoshtaClient,
}

impl NovaPoshtaGateway {
    pub fn new(db: Arc<DatabaseConnection>, client: NovaPoshtaClient) -> Self {
        Self { db, client }
    }

    pub fn client(&self) -> &NovaPoshtaClient {
        &self.client
    }
}

#[async_trait]
impl DeliveryGateway for NovaPoshtaGateway {
    fn carrier(&self) -> Carrier {
        Carrier::NovaPoshta
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
