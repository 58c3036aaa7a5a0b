use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    gateways::{delivery::DeliveryGatewayFactory, payments::PaymentGatewayFactory},
    services::{carts::CartService, checkout::CheckoutService, payments::PaymentService},
};

pub mod carts;
pub mod checkout;
pub mod delivery;
pub mod payments;

/// Aggregated service handles shared by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentService>,
    pub delivery_gateways: Arc<DeliveryGatewayFactory>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        cfg: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let payment_gateways = Arc::new(PaymentGatewayFactory::from_config(cfg));
        let delivery_gateways = Arc::new(DeliveryGatewayFactory::from_config(db.clone(), cfg)?);

        Ok(Self {
            carts: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                delivery_gateways.clone(),
                cfg.currency.clone(),
            )),
            payments: Arc::new(PaymentService::new(db, event_sender, payment_gateways)),
            delivery_gateways,
        })
    }
}

/// The authenticated principal, injected by the auth layer in front of this
/// service as an `X-Customer-Id` header.
pub struct CustomerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CustomerId
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-customer-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(CustomerId)
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "Missing or invalid X-Customer-Id header".to_string(),
                )
            })
    }
}

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard accepted response
pub fn accepted_response<T: Serialize>(data: T) -> Response {
    (StatusCode::ACCEPTED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
