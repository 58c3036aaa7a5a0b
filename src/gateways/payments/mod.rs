use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    config::AppConfig,
    entities::{order, PaymentProvider, PaymentStatus},
    errors::ServiceError,
};

pub mod fondy;
pub mod liqpay;
pub mod monobank;

pub use fondy::FondyGateway;
pub use liqpay::LiqpayGateway;
pub use monobank::MonobankGateway;

/// A checkout session opened with a provider. `payload` is handed to the
/// client verbatim; the frontend renders exactly what the provider expects.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InitiatedPayment {
    pub external_reference: String,
    pub payload: Value,
}

/// Provider callback normalized into the shared payment vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackData {
    pub external_reference: String,
    pub status: PaymentStatus,
    pub amount: Option<Decimal>,
}

/// Contract every payment provider adapter implements.
///
/// Adapters are pure protocol: they build signed payloads, check callback
/// authenticity and translate provider status vocabularies. Order and
/// payment state transitions belong to `services::payments`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Builds the provider-specific signed checkout payload for an order.
    /// Must not mutate order state.
    async fn initiate(&self, order: &order::Model) -> Result<InitiatedPayment, ServiceError>;

    /// Recomputes the provider signature over the canonicalized payload and
    /// compares it in constant time. Malformed input yields `Ok(false)`;
    /// a payload missing required fields fails with `InvalidCallback`.
    fn verify_signature(
        &self,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> Result<bool, ServiceError>;

    /// Normalizes the provider callback into `CallbackData`. Call only
    /// after `verify_signature` returned true.
    fn parse_callback(&self, raw_body: &[u8]) -> Result<CallbackData, ServiceError>;
}

/// Static registry resolving a provider enum to its adapter. Built once at
/// process start; `resolve` is a pure lookup with no I/O.
pub struct PaymentGatewayFactory {
    registry: HashMap<PaymentProvider, Arc<dyn PaymentGateway>>,
}

impl PaymentGatewayFactory {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut registry: HashMap<PaymentProvider, Arc<dyn PaymentGateway>> = HashMap::new();
        registry.insert(
            PaymentProvider::Liqpay,
            Arc::new(LiqpayGateway::new(
                cfg.liqpay_public_key.clone(),
                cfg.liqpay_private_key.clone(),
            )),
        );
        registry.insert(
            PaymentProvider::Fondy,
            Arc::new(FondyGateway::new(
                cfg.fondy_merchant_id.clone(),
                cfg.fondy_secret_key.clone(),
            )),
        );
        registry.insert(
            PaymentProvider::Monobank,
            Arc::new(MonobankGateway::new(cfg.monobank_secret_key.clone())),
        );
        Self { registry }
    }

    /// Registry from explicit adapters, for wiring test doubles.
    pub fn with_registry(registry: HashMap<PaymentProvider, Arc<dyn PaymentGateway>>) -> Self {
        Self { registry }
    }

    /// Parses a provider name from the wire into the closed enum.
    pub fn parse_provider(name: &str) -> Result<PaymentProvider, ServiceError> {
        name.parse::<PaymentProvider>()
            .map_err(|_| ServiceError::UnsupportedGateway(name.to_string()))
    }

    pub fn resolve(
        &self,
        provider: PaymentProvider,
    ) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        self.registry
            .get(&provider)
            .cloned()
            .ok_or_else(|| ServiceError::UnsupportedGateway(provider.to_string()))
    }
}

/// Reads a decimal amount that providers send either as a JSON string or a
/// bare number.
pub(crate) fn decimal_field(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.parse::<Decimal>().ok(),
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        _ => None,
    }
}

/// Compares two signature strings without short-circuiting on the first
/// mismatching byte.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
