use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{signal, sync::mpsc};
use tracing::info;

use storefront_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db = Arc::new(api::db::establish_connection(&cfg).await?);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Build services and gateway registries
    let services =
        api::handlers::AppServices::new(db.clone(), Arc::new(event_sender.clone()), &cfg)?;

    // Background carrier reference-data synchronizer, decoupled from
    // request handling.
    let sync_client = api::gateways::delivery::NovaPoshtaClient::new(
        cfg.nova_poshta_api_key.clone(),
        cfg.nova_poshta_api_url.clone(),
        Duration::from_secs(cfg.gateway_timeout_secs),
    )?;
    let sync = Arc::new(api::services::delivery_sync::ReferenceDataSync::new(
        db.clone(),
        sync_client,
        Arc::new(event_sender.clone()),
        cfg.reference_sync_page_size,
    ));
    api::services::delivery_sync::spawn_scheduler(
        sync,
        Duration::from_secs(cfg.reference_sync_interval_secs),
    );

    let state = api::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        services,
    };
    let app = api::app(state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}
