use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    entities::{order, PaymentProvider, PaymentStatus},
    errors::ServiceError,
};

use super::{constant_time_eq, decimal_field, CallbackData, InitiatedPayment, PaymentGateway};

const CHECKOUT_URL: &str = "https://www.liqpay.ua/api/3/checkout";

/// LiqPay adapter. The API exchanges a base64-encoded JSON document plus a
/// signature of `base64(sha256(private_key + data + private_key))`; the
/// callback carries the same `{data, signature}` pair.
pub struct LiqpayGateway {
    public_key: String,
    private_key: String,
}

impl LiqpayGateway {
    pub fn new(public_key: String, private_key: String) -> Self {
        Self {
            public_key,
            private_key,
        }
    }

    fn sign(&self, data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.private_key.as_bytes());
        hasher.update(data.as_bytes());
        hasher.update(self.private_key.as_bytes());
        BASE64.encode(hasher.finalize())
    }
}

#[async_trait]
impl PaymentGateway for LiqpayGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Liqpay
    }

    async fn initiate(&self, order: &order::Model) -> Result<InitiatedPayment, ServiceError> {
        let external_reference = format!("LP-{}", Uuid::new_v4());

        let document = json!({
            "version": 3,
            "action": "pay",
            "public_key": self.public_key,
            "amount": order.total_amount,
            "currency": order.currency,
            "description": format!("Order {}", order.id),
            "order_id": external_reference,
        });
        let data = BASE64.encode(
            serde_json::to_vec(&document)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?,
        );
        let signature = self.sign(&data);

        Ok(InitiatedPayment {
            external_reference,
            payload: json!({
                "checkout_url": CHECKOUT_URL,
                "data": data,
                "signature": signature,
            }),
        })
    }

    fn verify_signature(
        &self,
        raw_body: &[u8],
        _headers: &HeaderMap,
    ) -> Result<bool, ServiceError> {
        let body: Value = match serde_json::from_slice(raw_body) {
            Ok(v) => v,
            Err(_) => return Ok(false),
        };
        let data = body
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::InvalidCallback("missing field `data`".to_string()))?;
        let signature = body.get("signature").and_then(Value::as_str).ok_or_else(|| {
            ServiceError::InvalidCallback("missing field `signature`".to_string())
        })?;

        Ok(constant_time_eq(&self.sign(data), signature))
    }

    fn parse_callback(&self, raw_body: &[u8]) -> Result<CallbackData, ServiceError> {
        let body: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::InvalidCallback(format!("invalid json: {}", e)))?;
        let data = body
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::InvalidCallback("missing field `data`".to_string()))?;
        let decoded = BASE64
            .decode(data)
            .map_err(|e| ServiceError::InvalidCallback(format!("invalid base64: {}", e)))?;
        let document: Value = serde_json::from_slice(&decoded)
            .map_err(|e| ServiceError::InvalidCallback(format!("invalid payload: {}", e)))?;

        let external_reference = document
            .get("order_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::InvalidCallback("missing field `order_id`".to_string()))?
            .to_string();
        let status = match document.get("status").and_then(Value::as_str) {
            Some("success") | Some("sandbox") => PaymentStatus::Succeeded,
            Some("failure") | Some("error") => PaymentStatus::Failed,
            Some("expired") => PaymentStatus::Expired,
            Some(other) => {
                return Err(ServiceError::InvalidCallback(format!(
                    "unknown status `{}`",
                    other
                )))
            }
            None => {
                return Err(ServiceError::InvalidCallback(
                    "missing field `status`".to_string(),
                ))
            }
        };
        let amount = document.get("amount").and_then(decimal_field);

        Ok(CallbackData {
            external_reference,
            status,
            amount,
        })
    }
}
