use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use std::sync::Arc;

use crate::{
    handlers::{created_response, CustomerId},
    services::checkout::CheckoutInput,
    AppState,
};

/// Creates the router for the checkout endpoint
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(checkout))
}

/// Convert the caller's active cart into an order with a delivery record.
/// Opening the payment session is a separate follow-up call.
async fn checkout(
    State(state): State<Arc<AppState>>,
    CustomerId(customer_id): CustomerId,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let placed = state.services.checkout.checkout(customer_id, payload).await?;
    Ok(created_response(placed))
}
