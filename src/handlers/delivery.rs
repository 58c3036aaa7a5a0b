use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    gateways::delivery::DeliveryGatewayFactory, handlers::success_response, AppState,
};

/// Creates the router for delivery reference-data endpoints. All listings
/// are served from the local cache maintained by the synchronizer.
pub fn delivery_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:carrier/regions", get(list_regions))
        .route("/:carrier/regions/:region_id/cities", get(list_cities))
        .route(
            "/:carrier/cities/:city_id/pickup-points",
            get(list_pickup_points),
        )
}

/// List a carrier's regions
async fn list_regions(
    State(state): State<Arc<AppState>>,
    Path(carrier): Path<String>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let carrier = DeliveryGatewayFactory::parse_carrier(&carrier)?;
    let gateway = state.services.delivery_gateways.resolve(carrier)?;
    let regions = gateway.list_regions().await?;
    Ok(success_response(regions))
}

/// List a carrier's cities within a region
async fn list_cities(
    State(state): State<Arc<AppState>>,
    Path((carrier, region_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let carrier = DeliveryGatewayFactory::parse_carrier(&carrier)?;
    let gateway = state.services.delivery_gateways.resolve(carrier)?;
    let cities = gateway.list_cities(region_id).await?;
    Ok(success_response(cities))
}

/// List a carrier's active pickup points within a city
async fn list_pickup_points(
    State(state): State<Arc<AppState>>,
    Path((carrier, city_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let carrier = DeliveryGatewayFactory::parse_carrier(&carrier)?;
    let gateway = state.services.delivery_gateways.resolve(carrier)?;
    let points = gateway.list_pickup_points(city_id).await?;
    Ok(success_response(points))
}
