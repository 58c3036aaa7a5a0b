use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    entities::{order, PaymentProvider, PaymentStatus},
    errors::ServiceError,
};

use super::{constant_time_eq, decimal_field, CallbackData, InitiatedPayment, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-sign";
const PAY_PAGE_URL: &str = "https://pay.mbnk.biz";

/// Monobank adapter. The callback body is plain JSON; its authenticity is
/// carried out-of-band in the `X-Sign` header as
/// `base64(hmac_sha256(secret, raw_body))`.
pub struct MonobankGateway {
    secret_key: String,
}

impl MonobankGateway {
    pub fn new(secret_key: String) -> Self {
        Self { secret_key }
    }

    fn sign(&self, raw_body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(raw_body);
        BASE64.encode(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl PaymentGateway for MonobankGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Monobank
    }

    async fn initiate(&self, order: &order::Model) -> Result<InitiatedPayment, ServiceError> {
        let external_reference = format!("MB-{}", Uuid::new_v4());

        Ok(InitiatedPayment {
            external_reference: external_reference.clone(),
            payload: json!({
                "invoice_id": external_reference,
                "page_url": format!("{}/{}", PAY_PAGE_URL, external_reference),
                "amount": order.total_amount,
                "currency": order.currency,
            }),
        })
    }

    fn verify_signature(
        &self,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> Result<bool, ServiceError> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .ok_or_else(|| {
                ServiceError::InvalidCallback(format!("missing `{}` header", SIGNATURE_HEADER))
            })?
            .to_str()
            .map_err(|_| {
                ServiceError::InvalidCallback(format!("unreadable `{}` header", SIGNATURE_HEADER))
            })?;

        Ok(constant_time_eq(&self.sign(raw_body), signature))
    }

    fn parse_callback(&self, raw_body: &[u8]) -> Result<CallbackData, ServiceError> {
        let body: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::InvalidCallback(format!("invalid json: {}", e)))?;

        let external_reference = body
            .get("invoice_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::InvalidCallback("missing field `invoice_id`".to_string())
            })?
            .to_string();
        let status = match body.get("status").and_then(Value::as_str) {
            Some("success") => PaymentStatus::Succeeded,
            Some("failure") => PaymentStatus::Failed,
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
        let amount = body.get("amount").and_then(decimal_field);

        Ok(CallbackData {
            external_reference,
            status,
            amount,
        })
    }
}
