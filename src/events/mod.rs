use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::metrics;

pub mod outbox;

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
}

// Define the various events that can occur in the system. These drive
// in-process logging and metrics; durable queue notifications go through
// the outbox instead (see [`outbox`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Product events
    ProductCreated(String),
    ProductUpdated(String),
    ProductDeleted(String),

    // Customer events
    CustomerCreated(String),
    CustomerUpdated(String),
    CustomerDeleted(String),

    // Order events
    OrderCreated {
        order_id: String,
        customer_id: String,
        total_price: Decimal,
    },
    OrderStatusChanged {
        order_id: String,
        old_status: String,
        new_status: String,
    },
    OrderUpdated(String),
    OrderDeleted(String),

    // Stock events
    StockChanged {
        product_id: String,
        previous_stock: i32,
        new_stock: i32,
    },

    // Upload events
    PaymentProofStored {
        file_name: String,
        order_id: Option<String>,
    },
}

// Function to process incoming events, logging each one and keeping the
// business metrics current.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::ProductCreated(product_id) => {
                metrics::STORE_METRICS.products_created.inc();
                info!(product_id = %product_id, "product created");
            }
            Event::ProductUpdated(product_id) => {
                info!(product_id = %product_id, "product updated");
            }
            Event::ProductDeleted(product_id) => {
                info!(product_id = %product_id, "product deleted");
            }
            Event::CustomerCreated(customer_id) => {
                metrics::STORE_METRICS.customers_created.inc();
                info!(customer_id = %customer_id, "customer created");
            }
            Event::CustomerUpdated(customer_id) => {
                info!(customer_id = %customer_id, "customer updated");
            }
            Event::CustomerDeleted(customer_id) => {
                info!(customer_id = %customer_id, "customer deleted");
            }
            Event::OrderCreated {
                order_id,
                customer_id,
                total_price,
            } => {
                info!(
                    order_id = %order_id,
                    customer_id = %customer_id,
                    total_price = %total_price,
                    "order created"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "order status changed"
                );
            }
            Event::OrderUpdated(order_id) => {
                info!(order_id = %order_id, "order updated");
            }
            Event::OrderDeleted(order_id) => {
                info!(order_id = %order_id, "order deleted");
            }
            Event::StockChanged {
                product_id,
                previous_stock,
                new_stock,
            } => {
                if new_stock == 0 {
                    warn!(product_id = %product_id, previous_stock, "product out of stock");
                } else {
                    info!(product_id = %product_id, previous_stock, new_stock, "stock changed");
                }
            }
            Event::PaymentProofStored {
                file_name,
                order_id,
            } => {
                metrics::STORE_METRICS.uploads_stored.inc();
                info!(
                    file_name = %file_name,
                    order_id = order_id.as_deref().unwrap_or("-"),
                    "payment proof stored"
                );
            }
        }
    }

    warn!("Event processing loop has ended");
}
