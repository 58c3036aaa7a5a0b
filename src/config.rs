use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "UAH";
const DEFAULT_NOVA_POSHTA_API_URL: &str = "https://api.novaposhta.ua/v2.0/json/";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 21_600; // 6 hours
const DEFAULT_SYNC_PAGE_SIZE: u32 = 500;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Currency all orders and payments are denominated in
    #[serde(default = "default_currency")]
    pub currency: String,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Timeout applied to every outbound gateway/carrier HTTP call
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// LiqPay merchant public key
    #[validate(length(min = 8))]
    pub liqpay_public_key: String,

    /// LiqPay signing key
    #[validate(length(min = 8))]
    pub liqpay_private_key: String,

    /// Fondy merchant id
    pub fondy_merchant_id: String,

    /// Fondy signing key
    #[validate(length(min = 8))]
    pub fondy_secret_key: String,

    /// Monobank signing key
    #[validate(length(min = 8))]
    pub monobank_secret_key: String,

    /// Nova Poshta API key
    pub nova_poshta_api_key: String,

    /// Nova Poshta API endpoint
    #[serde(default = "default_nova_poshta_api_url")]
    pub nova_poshta_api_url: String,

    /// Interval between carrier reference-data synchronization runs
    #[serde(default = "default_sync_interval_secs")]
    pub reference_sync_interval_secs: u64,

    /// Page size for paginated carrier reference-data fetches
    #[serde(default = "default_sync_page_size")]
    pub reference_sync_page_size: u32,
}

impl AppConfig {
    /// Builds a configuration with development defaults. Used by tests and
    /// by callers that configure programmatically instead of via files/env.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            currency: default_currency(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            liqpay_public_key: "sandbox_public".to_string(),
            liqpay_private_key: "sandbox_liqpay_key".to_string(),
            fondy_merchant_id: "1396424".to_string(),
            fondy_secret_key: "sandbox_fondy_key".to_string(),
            monobank_secret_key: "sandbox_monobank_key".to_string(),
            nova_poshta_api_key: "sandbox_np_key".to_string(),
            nova_poshta_api_url: default_nova_poshta_api_url(),
            reference_sync_interval_secs: default_sync_interval_secs(),
            reference_sync_page_size: default_sync_page_size(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/default`, an environment-specific file
/// and `APP__`-prefixed environment variables, then validates it.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("currency", DEFAULT_CURRENCY)?
        .set_default("liqpay_public_key", "sandbox_public")?
        .set_default("liqpay_private_key", "sandbox_liqpay_key")?
        .set_default("fondy_merchant_id", "1396424")?
        .set_default("fondy_secret_key", "sandbox_fondy_key")?
        .set_default("monobank_secret_key", "sandbox_monobank_key")?
        .set_default("nova_poshta_api_key", "")?
        .set_default("nova_poshta_api_url", DEFAULT_NOVA_POSHTA_API_URL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn default_nova_poshta_api_url() -> String {
    DEFAULT_NOVA_POSHTA_API_URL.to_string()
}

fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_sync_page_size() -> u32 {
    DEFAULT_SYNC_PAGE_SIZE
}
