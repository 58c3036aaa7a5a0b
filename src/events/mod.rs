use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{Carrier, PaymentProvider};

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemUpdated { cart_id: Uuid, item_id: Uuid },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },
    CartCleared(Uuid),

    // Checkout events
    OrderCreated(Uuid),
    CheckoutCompleted { cart_id: Uuid, order_id: Uuid },
    ShipmentCreated { order_id: Uuid, carrier: Carrier },

    // Payment events
    PaymentSessionOpened { order_id: Uuid, provider: PaymentProvider },
    PaymentSucceeded(Uuid),
    PaymentFailed(Uuid),

    // Reference-data synchronizer events
    ReferenceDataSynced {
        carrier: Carrier,
        regions: usize,
        cities: usize,
        pickup_points: usize,
    },
    ReferenceDataSyncFailed { carrier: Carrier, reason: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Business operations never fail because of event delivery.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Consumes events from the channel and logs them. Runs for the lifetime of
/// the process; dropping all senders ends the loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentFailed(order_id) => {
                warn!("Payment failed for order {}", order_id);
            }
            Event::ReferenceDataSyncFailed { carrier, reason } => {
                warn!("Reference data sync failed for {}: {}", carrier, reason);
            }
            _ => info!("Received event: {:?}", event),
        }
    }

    info!("Event processing loop stopped");
}
