use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    handlers::{accepted_response, created_response, success_response},
    services::payments::CallbackOutcome,
    AppState,
};

/// Creates the router for payment endpoints. The callback route is public:
/// providers authenticate through their signature, not through a session.
pub fn payments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/:order_id/session", post(open_session))
        .route("/callback/:provider", post(callback))
}

#[derive(Debug, Deserialize)]
struct OpenPaymentRequest {
    gateway: String,
}

/// Open a provider checkout session for an order
async fn open_session(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<OpenPaymentRequest>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let session = state
        .services
        .payments
        .open_session(order_id, &payload.gateway)
        .await?;
    Ok(created_response(session))
}

/// Provider callback endpoint. The body is treated as opaque bytes; the
/// adapter decides how to verify and parse it.
async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let outcome = state
        .services
        .payments
        .handle_callback(&provider, &body, &headers)
        .await?;

    Ok(match outcome {
        CallbackOutcome::Applied { status } => accepted_response(json!({ "status": status })),
        CallbackOutcome::AlreadyProcessed { status } => success_response(json!({
            "status": status,
            "message": "already processed",
        })),
    })
}
