use crate::{
    entities::{cart, cart_item, Cart, CartItem, CartModel, CartStatus, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service.
///
/// Every mutation runs as one transaction against the caller's single
/// active cart (created lazily on first add), so concurrent requests for
/// the same customer cannot produce duplicate carts or lost updates.
/// Availability checks are delegated to the catalog's product rows.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a product to the customer's active cart, creating the cart if
    /// needed. An existing line for the same product has its quantity
    /// incremented instead of a second line being inserted; the unit price
    /// is snapshotted from the catalog at add time.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartWithItems, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;
        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is not purchasable",
                product.id
            )));
        }

        let (cart, cart_created) = self.get_or_create_active(&txn, customer_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        let requested = existing.as_ref().map_or(0, |item| item.quantity) + input.quantity;
        if product.stock < requested {
            return Err(ServiceError::InsufficientStock(format!(
                "Product {} has {} in stock, {} requested",
                product.id, product.stock, requested
            )));
        }

        if let Some(item) = existing {
            let unit_price = item.unit_price;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(requested);
            item.line_total = Set(unit_price * Decimal::from(requested));
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                unit_price: Set(product.price),
                line_total: Set(product.price * Decimal::from(input.quantity)),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        let result = load_cart_with_items(&txn, cart.id).await?;
        txn.commit().await?;

        if cart_created {
            self.event_sender.send_or_log(Event::CartCreated(cart.id)).await;
        }
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added product {} x{} to cart {}",
            input.product_id, input.quantity, cart.id
        );
        Ok(result)
    }

    /// Sets the quantity of a line in the customer's active cart.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1; use remove to delete the line".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let (cart, item) = self.owned_item(&txn, customer_id, item_id).await?;

        let product = Product::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;
        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Product {} has {} in stock, {} requested",
                product.id, product.stock, quantity
            )));
        }

        let unit_price = item.unit_price;
        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.line_total = Set(unit_price * Decimal::from(quantity));
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        let result = load_cart_with_items(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
            })
            .await;

        Ok(result)
    }

    /// Removes a line from the customer's active cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, item) = self.owned_item(&txn, customer_id, item_id).await?;

        item.delete(&txn).await?;

        let result = load_cart_with_items(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        Ok(result)
    }

    /// Returns the customer's active cart with its lines.
    pub async fn get_active(&self, customer_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = active_cart(&*self.db, customer_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No active cart".to_string()))?;

        load_cart_with_items(&*self.db, cart.id).await
    }

    /// Deletes every line from the customer's active cart. The cart itself
    /// stays active.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let cart = active_cart(&txn, customer_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No active cart".to_string()))?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let mut cart: cart::ActiveModel = cart.into();
        cart.updated_at = Set(Utc::now());
        let cart = cart.update(&txn).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;

        info!("Cleared cart: {}", cart.id);
        Ok(())
    }

    /// Returns the active cart, creating one when none exists. The second
    /// value tells the caller whether this call created it, so the creation
    /// event can be published only once the transaction commits.
    async fn get_or_create_active(
        &self,
        conn: &impl ConnectionTrait,
        customer_id: Uuid,
    ) -> Result<(CartModel, bool), ServiceError> {
        if let Some(cart) = active_cart(conn, customer_id).await? {
            return Ok((cart, false));
        }

        let cart_id = Uuid::new_v4();
        let cart = cart::ActiveModel {
            id: Set(cart_id),
            customer_id: Set(customer_id),
            status: Set(CartStatus::Active),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let cart = cart.insert(conn).await?;

        info!("Created cart {} for customer {}", cart_id, customer_id);
        Ok((cart, true))
    }

    /// Fetches a cart line and proves it belongs to the caller's active
    /// cart. A foreign or stale line is indistinguishable from a missing
    /// one.
    async fn owned_item(
        &self,
        conn: &impl ConnectionTrait,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<(CartModel, cart_item::Model), ServiceError> {
        let item = CartItem::find_by_id(item_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let cart = Cart::find_by_id(item.cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        if cart.customer_id != customer_id || cart.status != CartStatus::Active {
            return Err(ServiceError::NotFound(format!(
                "Cart item {} not found",
                item_id
            )));
        }

        Ok((cart, item))
    }
}

pub(crate) async fn active_cart(
    conn: &impl ConnectionTrait,
    customer_id: Uuid,
) -> Result<Option<CartModel>, ServiceError> {
    Ok(Cart::find()
        .filter(cart::Column::CustomerId.eq(customer_id))
        .filter(cart::Column::Status.eq(CartStatus::Active))
        .one(conn)
        .await?)
}

pub(crate) async fn load_cart_with_items(
    conn: &impl ConnectionTrait,
    cart_id: Uuid,
) -> Result<CartWithItems, ServiceError> {
    let cart = Cart::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

    let items = cart.find_related(CartItem).all(conn).await?;
    let total = items.iter().map(|item| item.line_total).sum();

    Ok(CartWithItems { cart, items, total })
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart with its lines and the derived total
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: CartModel,
    pub items: Vec<cart_item::Model>,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn add_item_input_deserialization() {
        let json = r#"{
            "product_id": "550e8400-e29b-41d4-a716-446655440000",
            "quantity": 3
        }"#;

        let input: AddItemInput =
            serde_json::from_str(json).expect("deserialization should succeed");
        assert_eq!(input.quantity, 3);
        assert_eq!(
            input.product_id.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn cart_total_is_sum_of_line_totals() {
        let line_totals = [dec!(20.00), dec!(5.00)];
        let total: Decimal = line_totals.iter().copied().sum();
        assert_eq!(total, dec!(25.00));
    }

    #[test]
    fn line_total_follows_quantity() {
        let unit_price = dec!(10.00);
        let quantity = 2;
        assert_eq!(unit_price * Decimal::from(quantity), dec!(20.00));
    }
}
