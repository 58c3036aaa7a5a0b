use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    handlers::{no_content_response, success_response, CustomerId},
    services::carts::AddItemInput,
    AppState,
};

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:item_id", put(update_item).delete(remove_item))
}

/// Get the caller's active cart with its lines
async fn get_cart(
    State(state): State<Arc<AppState>>,
    CustomerId(customer_id): CustomerId,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let cart = state.services.carts.get_active(customer_id).await?;
    Ok(success_response(cart))
}

/// Add a product to the caller's active cart
async fn add_item(
    State(state): State<Arc<AppState>>,
    CustomerId(customer_id): CustomerId,
    Json(payload): Json<AddItemInput>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let cart = state.services.carts.add_item(customer_id, payload).await?;
    Ok(success_response(cart))
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

/// Set the quantity of a cart line
async fn update_item(
    State(state): State<Arc<AppState>>,
    CustomerId(customer_id): CustomerId,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let cart = state
        .services
        .carts
        .update_item_quantity(customer_id, item_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

/// Remove a cart line
async fn remove_item(
    State(state): State<Arc<AppState>>,
    CustomerId(customer_id): CustomerId,
    Path(item_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    let cart = state
        .services
        .carts
        .remove_item(customer_id, item_id)
        .await?;
    Ok(success_response(cart))
}

/// Clear all lines from the caller's active cart
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    CustomerId(customer_id): CustomerId,
) -> Result<impl axum::response::IntoResponse, crate::errors::ServiceError> {
    state.services.carts.clear(customer_id).await?;
    Ok(no_content_response())
}
