//! Storefront API Library
//!
//! Transactional core of the storefront backend: cart lifecycle, checkout,
//! payment gateways with asynchronous callbacks, and delivery gateways with
//! a background reference-data synchronizer.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateways;
pub mod handlers;
pub mod services;

use axum::{routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Assembles the application router on top of the shared state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/cart", handlers::carts::carts_routes())
        .nest("/api/v1/checkout", handlers::checkout::checkout_routes())
        .nest("/api/v1/payments", handlers::payments::payments_routes())
        .nest("/api/v1/delivery", handlers::delivery::delivery_routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
