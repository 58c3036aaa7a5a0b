use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    entities::{order, PaymentProvider, PaymentStatus},
    errors::ServiceError,
};

use super::{constant_time_eq, CallbackData, InitiatedPayment, PaymentGateway};

const CHECKOUT_URL: &str = "https://pay.fondy.eu/api/checkout/redirect/";

/// Fondy adapter. Requests and callbacks are flat field maps; the signature
/// is `hex(sha256(secret | value | value | ...))` over the values of all
/// non-empty fields except `signature`, ordered by field name. Amounts are
/// denominated in minor units (kopecks).
pub struct FondyGateway {
    merchant_id: String,
    secret_key: String,
}

impl FondyGateway {
    pub fn new(merchant_id: String, secret_key: String) -> Self {
        Self {
            merchant_id,
            secret_key,
        }
    }

    fn sign_fields(&self, fields: &Map<String, Value>) -> String {
        let mut keys: Vec<&String> = fields
            .keys()
            .filter(|k| k.as_str() != "signature")
            .collect();
        keys.sort();

        let mut canonical = self.secret_key.clone();
        for key in keys {
            let value = match &fields[key.as_str()] {
                Value::String(s) if !s.is_empty() => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            canonical.push('|');
            canonical.push_str(&value);
        }

        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for FondyGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Fondy
    }

    async fn initiate(&self, order: &order::Model) -> Result<InitiatedPayment, ServiceError> {
        let external_reference = format!("FD-{}", Uuid::new_v4());
        let minor_units = (order.total_amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "order total {} not representable in minor units",
                    order.total_amount
                ))
            })?;

        let mut request = Map::new();
        request.insert("merchant_id".into(), Value::String(self.merchant_id.clone()));
        request.insert("order_id".into(), Value::String(external_reference.clone()));
        request.insert("amount".into(), Value::String(minor_units.to_string()));
        request.insert("currency".into(), Value::String(order.currency.clone()));
        request.insert(
            "order_desc".into(),
            Value::String(format!("Order {}", order.id)),
        );
        let signature = self.sign_fields(&request);
        request.insert("signature".into(), Value::String(signature));

        Ok(InitiatedPayment {
            external_reference,
            payload: json!({
                "checkout_url": CHECKOUT_URL,
                "request": Value::Object(request),
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
        let fields = match body.as_object() {
            Some(fields) => fields,
            None => return Ok(false),
        };
        let signature = fields
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::InvalidCallback("missing field `signature`".to_string())
            })?;

        Ok(constant_time_eq(&self.sign_fields(fields), signature))
    }

    fn parse_callback(&self, raw_body: &[u8]) -> Result<CallbackData, ServiceError> {
        let body: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::InvalidCallback(format!("invalid json: {}", e)))?;

        let external_reference = body
            .get("order_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::InvalidCallback("missing field `order_id`".to_string()))?
            .to_string();
        let status = match body.get("order_status").and_then(Value::as_str) {
            Some("approved") => PaymentStatus::Succeeded,
            Some("declined") => PaymentStatus::Failed,
            Some("expired") => PaymentStatus::Expired,
            Some(other) => {
                return Err(ServiceError::InvalidCallback(format!(
                    "unknown order_status `{}`",
                    other
                )))
            }
            None => {
                return Err(ServiceError::InvalidCallback(
                    "missing field `order_status`".to_string(),
                ))
            }
        };
        let amount = match body.get("amount") {
            Some(Value::String(s)) => s.parse::<i64>().ok(),
            Some(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
        .map(|minor_units| Decimal::from(minor_units) / Decimal::from(100));

        Ok(CallbackData {
            external_reference,
            status,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gateway() -> FondyGateway {
        FondyGateway::new("1000".to_string(), "fondy_secret".to_string())
    }

    fn signed_callback(gw: &FondyGateway, mut fields: Map<String, Value>) -> Vec<u8> {
        let signature = gw.sign_fields(&fields);
        fields.insert("signature".into(), Value::String(signature));
        serde_json::to_vec(&Value::Object(fields)).unwrap()
    }

    fn approved_fields() -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("order_id".into(), Value::String("FD-7".into()));
        fields.insert("order_status".into(), Value::String("approved".into()));
        fields.insert("amount".into(), Value::String("2500".into()));
        fields
    }

    #[test]
    fn verifies_own_signature() {
        let gw = gateway();
        let body = signed_callback(&gw, approved_fields());
        assert!(gw.verify_signature(&body, &HeaderMap::new()).unwrap());
    }

    #[test]
    fn signature_covers_every_field() {
        let gw = gateway();
        let body = signed_callback(&gw, approved_fields());
        let mut tampered: Value = serde_json::from_slice(&body).unwrap();
        tampered["amount"] = Value::String("1".into());

        let raw = serde_json::to_vec(&tampered).unwrap();
        assert!(!gw.verify_signature(&raw, &HeaderMap::new()).unwrap());
    }

    #[test]
    fn missing_signature_is_invalid_callback() {
        let gw = gateway();
        let raw = serde_json::to_vec(&Value::Object(approved_fields())).unwrap();
        assert!(matches!(
            gw.verify_signature(&raw, &HeaderMap::new()),
            Err(ServiceError::InvalidCallback(_))
        ));
    }

    #[test]
    fn parses_minor_units_into_decimal() {
        let gw = gateway();
        let body = signed_callback(&gw, approved_fields());
        let parsed = gw.parse_callback(&body).unwrap();
        assert_eq!(parsed.external_reference, "FD-7");
        assert_eq!(parsed.status, PaymentStatus::Succeeded);
        assert_eq!(parsed.amount, Some(dec!(25.00)));
    }

    #[tokio::test]
    async fn initiate_signs_the_request() {
        let gw = gateway();
        let order = order_fixture();
        let initiated = gw.initiate(&order).await.unwrap();

        let request = initiated.payload["request"].as_object().unwrap().clone();
        let signature = request["signature"].as_str().unwrap().to_string();
        assert_eq!(gw.sign_fields(&request), signature);
        assert_eq!(request["amount"], Value::String("2500".into()));
    }

    fn order_fixture() -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            status: crate::entities::OrderStatus::Created,
            currency: "UAH".to_string(),
            total_amount: dec!(25.00),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }
}
