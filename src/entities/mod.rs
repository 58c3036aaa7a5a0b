/// Persistent entities for the storefront core.
pub mod cart;
pub mod cart_item;
pub mod carrier_city;
pub mod carrier_region;
pub mod delivery;
pub mod order;
pub mod order_line;
pub mod payment;
pub mod pickup_point;
pub mod product;

// Re-export entities
pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use carrier_city::{Entity as CarrierCity, Model as CarrierCityModel};
pub use carrier_region::{Entity as CarrierRegion, Model as CarrierRegionModel};
pub use delivery::{Carrier, DeliveryStatus, Entity as Delivery, Model as DeliveryModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_line::{Entity as OrderLine, Model as OrderLineModel};
pub use payment::{Entity as Payment, Model as PaymentModel, PaymentProvider, PaymentStatus};
pub use pickup_point::{Entity as PickupPoint, Model as PickupPointModel};
pub use product::{Entity as Product, Model as ProductModel};
