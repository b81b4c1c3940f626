use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{Customer, Order, Product};
use crate::errors::ServiceError;
use crate::events::outbox;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::storage::{Etag, StorageClient, ORDER_NOTIFICATIONS_QUEUE, STOCK_UPDATES_QUEUE};

/// How many times a contended stock decrement is retried on a fresh read
/// before the order is given up.
const STOCK_UPDATE_ATTEMPTS: u32 = 5;

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Please select a valid customer and product"))]
    pub customer_id: String,
    #[validate(length(min = 1, message = "Please select a valid customer and product"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Defaults to the submission instant.
    pub order_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default, ToSchema)]
pub struct UpdateOrderRequest {
    pub quantity: Option<i32>,
    pub status: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    /// Version token from a previous read. Omitted, the replace is forced
    /// through regardless of concurrent edits.
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub username: String,
    pub product_id: String,
    pub product_name: String,
    pub order_date: DateTime<Utc>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub status: String,
    pub version: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.row_key,
            customer_id: order.customer_id,
            username: order.username,
            product_id: order.product_id,
            product_name: order.product_name,
            order_date: order.order_date,
            quantity: order.quantity,
            unit_price: order.unit_price,
            total_price: order.total_price,
            status: order.status,
            version: order.etag.to_string(),
        }
    }
}

struct StockChange {
    product: Product,
    previous: i32,
}

/// Service for managing orders.
///
/// Order creation snapshots the customer and product, decrements stock
/// through a compare-and-swap on the product's version token, and records
/// both queue notifications as outbox intents in the same table store.
#[derive(Clone)]
pub struct OrderService {
    storage: StorageClient,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(storage: StorageClient, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            storage,
            event_sender,
        }
    }

    /// Lists all orders, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderResponse>, ServiceError> {
        let mut orders = self.storage.list_entities::<Order>().await?;
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders.into_iter().map(OrderResponse::from).collect())
    }

    /// Gets an order by id
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: &str) -> Result<Option<OrderResponse>, ServiceError> {
        let order = self.storage.get_entity::<Order>(order_id).await?;
        Ok(order.map(OrderResponse::from))
    }

    /// Places an order.
    ///
    /// Validates the selection against live customer and product rows,
    /// checks stock, persists the order with snapshotted name and price,
    /// then decrements stock and queues the two notifications. A stock
    /// decrement that fails permanently rolls the order row back.
    #[instrument(
        skip(self, request),
        fields(
            customer_id = %request.customer_id,
            product_id = %request.product_id,
            quantity = request.quantity
        )
    )]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let started = Instant::now();
        request.validate()?;

        let customer = self
            .storage
            .get_entity::<Customer>(&request.customer_id)
            .await?;
        let product = self.storage.get_entity::<Product>(&request.product_id).await?;
        let (customer, product) = match (customer, product) {
            (Some(customer), Some(product)) => (customer, product),
            _ => {
                metrics::STORE_METRICS.record_order_rejected();
                return Err(ServiceError::ValidationError(
                    "Please select a valid customer and product".to_string(),
                ));
            }
        };

        if product.stock_available < request.quantity {
            metrics::STORE_METRICS.record_order_rejected();
            return Err(ServiceError::InsufficientStock(format!(
                "Insufficient stock for {}. Available: {}",
                product.product_name, product.stock_available
            )));
        }

        let mut order = Order::new(
            customer.id().to_string(),
            customer.username.clone(),
            product.id().to_string(),
            product.product_name.clone(),
            request.order_date.unwrap_or_else(Utc::now),
            request.quantity,
            product.price,
        );
        self.storage.add_entity(&mut order).await?;

        let stock = match self.decrement_stock(product, request.quantity).await {
            Ok(stock) => stock,
            Err(e) => {
                // Undo the order row so a lost stock race leaves no trace.
                if let Err(rollback) = self.storage.delete_entity::<Order>(order.id()).await {
                    warn!(
                        order_id = %order.id(),
                        "failed rolling back order after stock update failure: {}", rollback
                    );
                }
                metrics::STORE_METRICS.record_order_rejected();
                return Err(e);
            }
        };

        self.record_order_notifications(&order, &customer, &stock)
            .await?;

        info!(
            order_id = %order.id(),
            total_price = %order.total_price,
            "Order created successfully"
        );
        metrics::STORE_METRICS.record_order_created(started.elapsed());

        self.send_event(Event::OrderCreated {
            order_id: order.id().to_string(),
            customer_id: order.customer_id.clone(),
            total_price: order.total_price,
        })
        .await;
        self.send_event(Event::StockChanged {
            product_id: stock.product.id().to_string(),
            previous_stock: stock.previous,
            new_stock: stock.product.stock_available,
        })
        .await;

        Ok(OrderResponse::from(order))
    }

    /// Replaces an order's editable fields
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: &str,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let mut order = self
            .storage
            .get_entity::<Order>(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if let Some(quantity) = request.quantity {
            if quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "Quantity must be at least 1".to_string(),
                ));
            }
            order.quantity = quantity;
            order.total_price = order.unit_price * Decimal::from(quantity);
        }
        if let Some(status) = request.status {
            if status.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Status is required".to_string(),
                ));
            }
            order.status = status;
        }
        if let Some(order_date) = request.order_date {
            order.order_date = order_date;
        }
        order.etag = match request.version {
            Some(version) => version.into(),
            None => Etag::wildcard(),
        };

        self.storage.update_entity(&mut order).await?;

        info!(order_id = %order.id(), "Order updated successfully");
        self.send_event(Event::OrderUpdated(order.id().to_string()))
            .await;
        Ok(OrderResponse::from(order))
    }

    /// Moves an order to a new status
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_order_status(
        &self,
        order_id: &str,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let mut order = self
            .storage
            .get_entity::<Order>(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = std::mem::replace(&mut order.status, request.status);
        self.storage.update_entity(&mut order).await?;

        let status_payload = json!({
            "order_id": order.id(),
            "old_status": old_status,
            "new_status": order.status,
            "updated_at": Utc::now(),
        });
        outbox::enqueue(&self.storage, ORDER_NOTIFICATIONS_QUEUE, &status_payload).await?;

        info!(
            order_id = %order.id(),
            old_status = %old_status,
            new_status = %order.status,
            "Order status updated"
        );
        self.send_event(Event::OrderStatusChanged {
            order_id: order.id().to_string(),
            old_status,
            new_status: order.status.clone(),
        })
        .await;
        Ok(OrderResponse::from(order))
    }

    /// Deletes an order
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: &str) -> Result<(), ServiceError> {
        self.storage.delete_entity::<Order>(order_id).await?;

        info!(order_id = %order_id, "Order deleted successfully");
        self.send_event(Event::OrderDeleted(order_id.to_string()))
            .await;
        Ok(())
    }

    /// Takes `quantity` off the product's stock with a compare-and-swap on
    /// its version token, re-reading on every conflict.
    async fn decrement_stock(
        &self,
        first_read: Product,
        quantity: i32,
    ) -> Result<StockChange, ServiceError> {
        let product_id = first_read.id().to_string();
        let mut product = first_read;

        for attempt in 0..STOCK_UPDATE_ATTEMPTS {
            if product.stock_available < quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for {}. Available: {}",
                    product.product_name, product.stock_available
                )));
            }

            let previous = product.stock_available;
            product.stock_available -= quantity;

            match self.storage.update_entity(&mut product).await {
                Ok(()) => return Ok(StockChange { product, previous }),
                Err(e) if e.is_conflict() && attempt + 1 < STOCK_UPDATE_ATTEMPTS => {
                    metrics::STORE_METRICS.record_stock_conflict();
                    product = self
                        .storage
                        .get_entity::<Product>(&product_id)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Conflict(format!(
            "stock update for product {} remained contended",
            product_id
        )))
    }

    /// Records the order-created and stock-changed notifications as outbox
    /// intents; the dispatcher delivers them to the queues.
    async fn record_order_notifications(
        &self,
        order: &Order,
        customer: &Customer,
        stock: &StockChange,
    ) -> Result<(), ServiceError> {
        let order_payload = json!({
            "order_id": order.id(),
            "customer_id": order.customer_id,
            "customer_name": customer.display_name(),
            "product_name": order.product_name,
            "quantity": order.quantity,
            "total_price": order.total_price,
            "order_date": order.order_date,
            "status": order.status,
        });
        outbox::enqueue(&self.storage, ORDER_NOTIFICATIONS_QUEUE, &order_payload).await?;

        let stock_payload = json!({
            "product_id": stock.product.id(),
            "product_name": stock.product.product_name,
            "previous_stock": stock.previous,
            "new_stock": stock.product.stock_available,
            "updated_by": "order-service",
            "updated_at": Utc::now(),
        });
        outbox::enqueue(&self.storage, STOCK_UPDATES_QUEUE, &stock_payload).await?;

        Ok(())
    }

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send order event");
            }
        }
    }
}
