mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use storefront_api::{
    entities::{
        cart, product, Carrier, CarrierCityModel, CarrierRegionModel, Cart, CartStatus, Delivery,
        DeliveryStatus, Order, OrderLine, OrderStatus, PickupPointModel,
    },
    errors::ServiceError,
    gateways::delivery::{
        ContactInfo, DeliveryGateway, DeliveryGatewayFactory, ShipmentReceipt, ShipmentRequest,
    },
    services::{carts::AddItemInput, checkout::CheckoutInput, checkout::CheckoutService},
};
use uuid::Uuid;

fn contact() -> ContactInfo {
    ContactInfo {
        full_name: "Olena Shevchenko".to_string(),
        phone: "+380501112233".to_string(),
    }
}

async fn fill_cart(app: &TestApp, customer: Uuid) -> (product::Model, product::Model) {
    let tea = app.seed_product("Green tea", dec!(10.00), 10).await;
    let honey = app.seed_product("Honey", dec!(5.00), 10).await;

    let carts = &app.state.services.carts;
    carts
        .add_item(
            customer,
            AddItemInput {
                product_id: tea.id,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    carts
        .add_item(
            customer,
            AddItemInput {
                product_id: honey.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    (tea, honey)
}

#[tokio::test]
async fn pickup_checkout_places_the_order() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let (tea, honey) = fill_cart(&app, customer).await;
    let point = app.seed_pickup_point(Carrier::Pickup).await;

    let placed = app
        .state
        .services
        .checkout
        .checkout(
            customer,
            CheckoutInput {
                carrier: "pickup".to_string(),
                pickup_point_id: point.id,
                contact: contact(),
            },
        )
        .await
        .unwrap();

    // Two units of tea at 10.00 plus one honey at 5.00.
    assert_eq!(placed.order.total_amount, dec!(25.00));
    assert_eq!(placed.order.status, OrderStatus::Created);
    assert_eq!(placed.lines.len(), 2);

    let tea_line = placed
        .lines
        .iter()
        .find(|line| line.product_id == tea.id)
        .unwrap();
    assert_eq!(tea_line.quantity, 2);
    assert_eq!(tea_line.unit_price, dec!(10.00));
    let honey_line = placed
        .lines
        .iter()
        .find(|line| line.product_id == honey.id)
        .unwrap();
    assert_eq!(honey_line.quantity, 1);
    assert_eq!(honey_line.unit_price, dec!(5.00));

    assert_eq!(placed.delivery.status, DeliveryStatus::CreatedWithCarrier);
    assert_eq!(placed.delivery.carrier, Carrier::Pickup);
    assert_eq!(placed.delivery.recipient_name, "Olena Shevchenko");

    // The cart is converted; there is no active cart left.
    let err = app
        .state
        .services
        .carts
        .get_active(customer)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn order_lines_keep_purchase_time_prices() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let (tea, _) = fill_cart(&app, customer).await;
    let point = app.seed_pickup_point(Carrier::Pickup).await;

    let placed = app
        .state
        .services
        .checkout
        .checkout(
            customer,
            CheckoutInput {
                carrier: "pickup".to_string(),
                pickup_point_id: point.id,
                contact: contact(),
            },
        )
        .await
        .unwrap();

    // Catalog price changes after checkout.
    let mut repriced: product::ActiveModel = tea.into();
    repriced.price = Set(dec!(99.99));
    repriced.update(&*app.state.db).await.unwrap();

    let order = Order::find_by_id(placed.order.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.total_amount, dec!(25.00));

    let lines = OrderLine::find()
        .filter(storefront_api::entities::order_line::Column::OrderId.eq(order.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert!(lines.iter().all(|line| line.unit_price != dec!(99.99)));
}

#[tokio::test]
async fn unknown_carrier_fails_before_any_mutation() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    fill_cart(&app, customer).await;

    let err = app
        .state
        .services
        .checkout
        .checkout(
            customer,
            CheckoutInput {
                carrier: "ups".to_string(),
                pickup_point_id: Uuid::new_v4(),
                contact: contact(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::UnsupportedGateway(_)));
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);

    let cart = app.state.services.carts.get_active(customer).await.unwrap();
    assert_eq!(cart.items.len(), 2);
}

#[tokio::test]
async fn empty_cart_cannot_be_checked_out() {
    let app = TestApp::new().await;
    let point = app.seed_pickup_point(Carrier::Pickup).await;

    let err = app
        .state
        .services
        .checkout
        .checkout(
            Uuid::new_v4(),
            CheckoutInput {
                carrier: "pickup".to_string(),
                pickup_point_id: point.id,
                contact: contact(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn unknown_pickup_point_fails_validation() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    fill_cart(&app, customer).await;

    let err = app
        .state
        .services
        .checkout
        .checkout(
            customer,
            CheckoutInput {
                carrier: "pickup".to_string(),
                pickup_point_id: Uuid::new_v4(),
                contact: contact(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
}

/// Carrier double whose booking call always fails, standing in for an
/// unreachable carrier network.
struct UnreachableCarrier;

#[async_trait]
impl DeliveryGateway for UnreachableCarrier {
    fn carrier(&self) -> Carrier {
        Carrier::NovaPoshta
    }

    async fn list_regions(&self) -> Result<Vec<CarrierRegionModel>, ServiceError> {
        Ok(vec![])
    }

    async fn list_cities(&self, _region_id: Uuid) -> Result<Vec<CarrierCityModel>, ServiceError> {
        Ok(vec![])
    }

    async fn list_pickup_points(
        &self,
        _city_id: Uuid,
    ) -> Result<Vec<PickupPointModel>, ServiceError> {
        Ok(vec![])
    }

    async fn create_shipment(
        &self,
        _request: &ShipmentRequest<'_>,
    ) -> Result<ShipmentReceipt, ServiceError> {
        Err(ServiceError::gateway(
            "carrier unreachable",
            std::io::Error::other("connection timed out"),
        ))
    }
}

#[tokio::test]
async fn carrier_failure_rolls_back_the_whole_checkout() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    fill_cart(&app, customer).await;
    let point = app.seed_pickup_point(Carrier::NovaPoshta).await;

    let mut registry: HashMap<Carrier, Arc<dyn DeliveryGateway>> = HashMap::new();
    registry.insert(Carrier::NovaPoshta, Arc::new(UnreachableCarrier));
    let checkout = CheckoutService::new(
        app.state.db.clone(),
        Arc::new(app.state.event_sender.clone()),
        Arc::new(DeliveryGatewayFactory::with_registry(registry)),
        "UAH".to_string(),
    );

    let err = checkout
        .checkout(
            customer,
            CheckoutInput {
                carrier: "nova_poshta".to_string(),
                pickup_point_id: point.id,
                contact: contact(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GatewayError(_)));

    // No order, no delivery, and the cart is exactly as it was.
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(Delivery::find().count(&*app.state.db).await.unwrap(), 0);
    let cart = app.state.services.carts.get_active(customer).await.unwrap();
    assert_eq!(cart.cart.status, CartStatus::Active);
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total, dec!(25.00));
}

#[tokio::test]
async fn a_converted_cart_cannot_be_checked_out_again() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    fill_cart(&app, customer).await;
    let point = app.seed_pickup_point(Carrier::Pickup).await;

    let input = || CheckoutInput {
        carrier: "pickup".to_string(),
        pickup_point_id: point.id,
        contact: contact(),
    };
    app.state
        .services
        .checkout
        .checkout(customer, input())
        .await
        .unwrap();

    let err = app
        .state
        .services
        .checkout
        .checkout(customer, input())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Converted cart stays converted.
    let carts = Cart::find()
        .filter(cart::Column::CustomerId.eq(customer))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(carts.len(), 1);
    assert_eq!(carts[0].status, CartStatus::Converted);
}
