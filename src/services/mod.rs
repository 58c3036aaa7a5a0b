pub mod carts;
pub mod checkout;
pub mod delivery_sync;
pub mod payments;

pub use carts::{AddItemInput, CartService, CartWithItems};
pub use checkout::{CheckoutInput, CheckoutService, PlacedOrder};
pub use delivery_sync::{ReferenceDataSync, SyncReport};
pub use payments::{CallbackOutcome, OpenedSession, PaymentService};
