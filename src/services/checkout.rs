use crate::{
    entities::{
        cart, delivery, order, order_line, CartStatus, DeliveryModel, DeliveryStatus, OrderModel,
        OrderStatus, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateways::delivery::{ContactInfo, DeliveryGatewayFactory, ShipmentRequest},
    services::carts::active_cart,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Checkout orchestrator: converts the customer's active cart into an order
/// with a delivery record, all or nothing.
///
/// The carrier adapter is consulted before any row is written, so an
/// unreachable or rejecting carrier leaves the cart exactly as it was; the
/// writes themselves happen in one short transaction.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    delivery_gateways: Arc<DeliveryGatewayFactory>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        delivery_gateways: Arc<DeliveryGatewayFactory>,
        currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            delivery_gateways,
            currency,
        }
    }

    /// Places an order from the customer's active cart.
    ///
    /// Line prices are snapshotted from the catalog at this moment; the
    /// resulting order total never changes afterwards. The payment session
    /// is opened separately by the caller so the storefront can confirm the
    /// order before redirecting to a provider.
    #[instrument(skip(self))]
    pub async fn checkout(
        &self,
        customer_id: Uuid,
        input: CheckoutInput,
    ) -> Result<PlacedOrder, ServiceError> {
        // Resolve the carrier before touching the database.
        let carrier = DeliveryGatewayFactory::parse_carrier(&input.carrier)?;
        let gateway = self.delivery_gateways.resolve(carrier)?;
        input.contact.validate()?;

        let cart = active_cart(&*self.db, customer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError("Cart is empty or doesn't exist".to_string())
            })?;
        let items = cart.find_related(crate::entities::CartItem).all(&*self.db).await?;
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cart is empty or doesn't exist".to_string(),
            ));
        }

        // Snapshot lines at current catalog prices and re-check availability.
        let order_id = Uuid::new_v4();
        let mut lines = Vec::with_capacity(items.len());
        let mut total = Decimal::ZERO;
        for item in &items {
            let product = Product::find_by_id(item.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            if !product.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Product {} is no longer purchasable",
                    product.id
                )));
            }
            if product.stock < item.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has {} in stock, {} requested",
                    product.id, product.stock, item.quantity
                )));
            }

            let line_total = product.price * Decimal::from(item.quantity);
            total += line_total;
            lines.push(order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(product.price),
                line_total: Set(line_total),
                created_at: Set(Utc::now()),
            });
        }

        // Carrier booking/validation happens before any row is written;
        // a failure here surfaces as-is and nothing is persisted.
        let request = ShipmentRequest {
            order_id,
            total_amount: total,
            pickup_point_id: input.pickup_point_id,
            contact: &input.contact,
        };
        let receipt = gateway.create_shipment(&request).await?;

        let txn = self.db.begin().await?;

        // Re-read the cart inside the transaction: a concurrent checkout of
        // the same cart must not convert it twice.
        let current = crate::entities::Cart::find_by_id(cart.id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart.id)))?;
        if current.status != CartStatus::Active {
            return Err(ServiceError::InvalidOperation(
                "Cart has already been checked out".to_string(),
            ));
        }

        let order = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(customer_id),
            status: Set(OrderStatus::Created),
            currency: Set(self.currency.clone()),
            total_amount: Set(total),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let order = order.insert(&txn).await?;

        let mut inserted_lines = Vec::with_capacity(lines.len());
        for line in lines {
            inserted_lines.push(line.insert(&txn).await?);
        }

        let delivery = delivery::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            carrier: Set(carrier),
            pickup_point_id: Set(receipt.pickup_point_id),
            recipient_name: Set(input.contact.full_name.clone()),
            recipient_phone: Set(input.contact.phone.clone()),
            tracking_number: Set(receipt.tracking_number.clone()),
            status: Set(DeliveryStatus::CreatedWithCarrier),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let delivery = delivery.insert(&txn).await?;

        let mut converted: cart::ActiveModel = current.into();
        converted.status = Set(CartStatus::Converted);
        converted.updated_at = Set(Utc::now());
        converted.update(&txn).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        self.event_sender
            .send_or_log(Event::ShipmentCreated { order_id, carrier })
            .await;
        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                cart_id: cart.id,
                order_id,
            })
            .await;

        info!(
            "Checkout completed: order {} ({} {}) from cart {}",
            order_id, order.total_amount, order.currency, cart.id
        );
        Ok(PlacedOrder {
            order,
            lines: inserted_lines,
            delivery,
        })
    }
}

/// Delivery selection and recipient contact for checkout
#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub carrier: String,
    pub pickup_point_id: Uuid,
    pub contact: ContactInfo,
}

/// A placed order with its lines and delivery record
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: OrderModel,
    pub lines: Vec<order_line::Model>,
    pub delivery: DeliveryModel,
}
