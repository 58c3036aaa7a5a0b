#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseBackend as DbBackend, Set, Statement,
};
use storefront_api::{
    config::AppConfig,
    db,
    entities::{carrier_city, carrier_region, pickup_point, product, Carrier},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Helper harness for spinning up application state backed by an in-memory
/// SQLite database.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory
        // database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        let pool = Arc::new(pool);

        create_schema(&pool).await;

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(pool.clone(), Arc::new(event_sender.clone()), &cfg)
            .expect("failed to build services");

        let state = AppState {
            db: pool,
            config: cfg,
            event_sender,
            services,
        };
        let router = storefront_api::app(state.clone());

        Self {
            state,
            router,
            _event_task: event_task,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Seeds a purchasable catalog product.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let row = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            stock: Set(stock),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        row.insert(&*self.state.db)
            .await
            .expect("failed to seed product")
    }

    /// Seeds a region, city and active pickup point for a carrier, returning
    /// the pickup point.
    pub async fn seed_pickup_point(&self, carrier: Carrier) -> pickup_point::Model {
        let suffix = Uuid::new_v4();
        let region = carrier_region::ActiveModel {
            id: Set(Uuid::new_v4()),
            carrier: Set(carrier),
            name: Set("Kyiv Oblast".to_string()),
            external_ref: Set(format!("region-{}", suffix)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let region = region
            .insert(&*self.state.db)
            .await
            .expect("failed to seed region");

        let city = carrier_city::ActiveModel {
            id: Set(Uuid::new_v4()),
            region_id: Set(region.id),
            carrier: Set(carrier),
            name: Set("Kyiv".to_string()),
            settlement_type: Set(Some("city".to_string())),
            external_ref: Set(format!("city-{}", suffix)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let city = city
            .insert(&*self.state.db)
            .await
            .expect("failed to seed city");

        let point = pickup_point::ActiveModel {
            id: Set(Uuid::new_v4()),
            city_id: Set(city.id),
            carrier: Set(carrier),
            address_line: Set("1 Khreshchatyk St".to_string()),
            description: Set(Some("Office 1".to_string())),
            office_number: Set(1),
            phone: Set(Some("+380441234567".to_string())),
            is_active: Set(true),
            external_ref: Set(format!("point-{}", suffix)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        point
            .insert(&*self.state.db)
            .await
            .expect("failed to seed pickup point")
    }
}

/// Creates the relational schema the entities map onto. Uniqueness
/// constraints back the one-active-cart, one-payment-per-order and
/// carrier+ref invariants.
async fn create_schema(pool: &sea_orm::DatabaseConnection) {
    let ddl = [
        r#"CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            price REAL NOT NULL,
            stock INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE IF NOT EXISTS carts (
            id TEXT PRIMARY KEY NOT NULL,
            customer_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_carts_active_per_customer
            ON carts (customer_id) WHERE status = 'active';"#,
        r#"CREATE TABLE IF NOT EXISTS cart_items (
            id TEXT PRIMARY KEY NOT NULL,
            cart_id TEXT NOT NULL REFERENCES carts (id),
            product_id TEXT NOT NULL REFERENCES products (id),
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL,
            line_total REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (cart_id, product_id)
        );"#,
        r#"CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY NOT NULL,
            customer_id TEXT NOT NULL,
            status TEXT NOT NULL,
            currency TEXT NOT NULL,
            total_amount REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE IF NOT EXISTS order_lines (
            id TEXT PRIMARY KEY NOT NULL,
            order_id TEXT NOT NULL REFERENCES orders (id),
            product_id TEXT NOT NULL,
            product_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL,
            line_total REAL NOT NULL,
            created_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE IF NOT EXISTS deliveries (
            id TEXT PRIMARY KEY NOT NULL,
            order_id TEXT NOT NULL UNIQUE REFERENCES orders (id),
            carrier TEXT NOT NULL,
            pickup_point_id TEXT NOT NULL REFERENCES carrier_pickup_points (id),
            recipient_name TEXT NOT NULL,
            recipient_phone TEXT NOT NULL,
            tracking_number TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY NOT NULL,
            order_id TEXT NOT NULL UNIQUE REFERENCES orders (id),
            provider TEXT NOT NULL,
            external_reference TEXT UNIQUE,
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            raw_callback TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE IF NOT EXISTS carrier_regions (
            id TEXT PRIMARY KEY NOT NULL,
            carrier TEXT NOT NULL,
            name TEXT NOT NULL,
            external_ref TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (carrier, external_ref)
        );"#,
        r#"CREATE TABLE IF NOT EXISTS carrier_cities (
            id TEXT PRIMARY KEY NOT NULL,
            region_id TEXT NOT NULL REFERENCES carrier_regions (id),
            carrier TEXT NOT NULL,
            name TEXT NOT NULL,
            settlement_type TEXT,
            external_ref TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (carrier, external_ref)
        );"#,
        r#"CREATE TABLE IF NOT EXISTS carrier_pickup_points (
            id TEXT PRIMARY KEY NOT NULL,
            city_id TEXT NOT NULL REFERENCES carrier_cities (id),
            carrier TEXT NOT NULL,
            address_line TEXT NOT NULL,
            description TEXT,
            office_number INTEGER NOT NULL,
            phone TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            external_ref TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (carrier, external_ref)
        );"#,
    ];

    for sql in ddl {
        pool.execute(Statement::from_string(DbBackend::Sqlite, sql.to_string()))
            .await
            .expect("failed to create schema");
    }
}
