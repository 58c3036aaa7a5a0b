use axum::http::HeaderMap;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{order, payment, Order, OrderStatus, Payment, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    gateways::payments::PaymentGatewayFactory,
};

/// Payment orchestrator: opens provider checkout sessions for orders and
/// applies asynchronous provider callbacks to order/payment state.
///
/// Callbacks are expected at least once; duplicates are answered
/// idempotently and a terminal payment status is never regressed.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateways: Arc<PaymentGatewayFactory>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateways: Arc<PaymentGatewayFactory>,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateways,
        }
    }

    /// Opens a provider checkout session for an order.
    ///
    /// The provider payload is returned verbatim; the frontend renders
    /// exactly what the provider expects. A still-pending payment row is
    /// superseded in place, keeping one payment per order; a settled one
    /// makes the call fail.
    #[instrument(skip(self))]
    pub async fn open_session(
        &self,
        order_id: Uuid,
        provider_name: &str,
    ) -> Result<OpenedSession, ServiceError> {
        let provider = PaymentGatewayFactory::parse_provider(provider_name)?;
        let gateway = self.gateways.resolve(provider)?;

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !matches!(
            order.status,
            OrderStatus::Created | OrderStatus::AwaitingPayment
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is not awaiting payment",
                order_id
            )));
        }
        if order.total_amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Order total must be greater than zero".to_string(),
            ));
        }

        let existing = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        if let Some(existing) = &existing {
            if existing.status.is_terminal() {
                return Err(ServiceError::InvalidOperation(format!(
                    "Order {} already has a settled payment",
                    order_id
                )));
            }
        }

        // Provider call happens before any state is written; a failure
        // here leaves order and payment untouched.
        let initiated = gateway.initiate(&order).await?;

        let txn = self.db.begin().await?;

        let payment_id = match existing {
            Some(pending) => {
                let id = pending.id;
                let mut pending: payment::ActiveModel = pending.into();
                pending.provider = Set(provider);
                pending.external_reference = Set(Some(initiated.external_reference.clone()));
                pending.amount = Set(order.total_amount);
                pending.currency = Set(order.currency.clone());
                pending.updated_at = Set(Utc::now());
                pending.update(&txn).await?;
                id
            }
            None => {
                let id = Uuid::new_v4();
                let row = payment::ActiveModel {
                    id: Set(id),
                    order_id: Set(order_id),
                    provider: Set(provider),
                    external_reference: Set(Some(initiated.external_reference.clone())),
                    amount: Set(order.total_amount),
                    currency: Set(order.currency.clone()),
                    status: Set(PaymentStatus::Pending),
                    raw_callback: Set(None),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                row.insert(&txn).await?;
                id
            }
        };

        if order.status == OrderStatus::Created {
            let mut order: order::ActiveModel = order.into();
            order.status = Set(OrderStatus::AwaitingPayment);
            order.updated_at = Set(Utc::now());
            order.update(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentSessionOpened { order_id, provider })
            .await;

        info!(
            "Opened {} payment session {} for order {}",
            provider, initiated.external_reference, order_id
        );
        Ok(OpenedSession {
            payment_id,
            external_reference: initiated.external_reference,
            payload: initiated.payload,
        })
    }

    /// Applies a provider callback.
    ///
    /// Verification comes first and is the security boundary: a callback
    /// that does not authenticate never touches state. A callback for an
    /// already-settled payment is an idempotent no-op, not an error.
    #[instrument(skip(self, raw_body, headers))]
    pub async fn handle_callback(
        &self,
        provider_name: &str,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> Result<CallbackOutcome, ServiceError> {
        let provider = PaymentGatewayFactory::parse_provider(provider_name)?;
        let gateway = self.gateways.resolve(provider)?;

        if !gateway.verify_signature(raw_body, headers)? {
            warn!("Rejected {} callback with invalid signature", provider);
            return Err(ServiceError::SignatureError);
        }

        let data = gateway.parse_callback(raw_body)?;
        if !data.status.is_terminal() {
            return Err(ServiceError::InvalidCallback(
                "callback carries no terminal status".to_string(),
            ));
        }

        // Check-then-transition is one transaction per payment row so that
        // two concurrent callbacks cannot both apply a transition.
        let txn = self.db.begin().await?;

        let payment = Payment::find()
            .filter(payment::Column::ExternalReference.eq(data.external_reference.clone()))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment {} not found", data.external_reference))
            })?;

        if payment.status.is_terminal() {
            info!(
                "Payment {} already processed ({:?}), ignoring duplicate callback",
                data.external_reference, payment.status
            );
            return Ok(CallbackOutcome::AlreadyProcessed {
                status: payment.status,
            });
        }

        if let Some(amount) = data.amount {
            if amount != payment.amount {
                return Err(ServiceError::InvalidCallback(format!(
                    "callback amount {} does not match payment amount {}",
                    amount, payment.amount
                )));
            }
        }

        let order = Order::find_by_id(payment.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", payment.order_id))
            })?;
        let order_id = order.id;

        let audit: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::InvalidCallback(format!("invalid json: {}", e)))?;

        let mut payment: payment::ActiveModel = payment.into();
        payment.status = Set(data.status);
        payment.raw_callback = Set(Some(audit));
        payment.updated_at = Set(Utc::now());
        payment.update(&txn).await?;

        let mut order: order::ActiveModel = order.into();
        order.status = Set(match data.status {
            PaymentStatus::Succeeded => OrderStatus::Paid,
            _ => OrderStatus::Failed,
        });
        order.updated_at = Set(Utc::now());
        order.update(&txn).await?;

        txn.commit().await?;

        match data.status {
            PaymentStatus::Succeeded => {
                self.event_sender
                    .send_or_log(Event::PaymentSucceeded(order_id))
                    .await;
            }
            _ => {
                self.event_sender
                    .send_or_log(Event::PaymentFailed(order_id))
                    .await;
            }
        }

        info!(
            "Payment {} settled as {:?}, order {}",
            data.external_reference, data.status, order_id
        );
        Ok(CallbackOutcome::Applied {
            status: data.status,
        })
    }
}

/// An opened provider checkout session
#[derive(Debug, Serialize)]
pub struct OpenedSession {
    pub payment_id: Uuid,
    pub external_reference: String,
    pub payload: Value,
}

/// Result of applying a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The transition was applied by this call.
    Applied { status: PaymentStatus },
    /// The payment was already settled; nothing changed.
    AlreadyProcessed { status: PaymentStatus },
}
