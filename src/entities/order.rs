use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityKind, TableEntity};
use crate::storage::tables::Etag;

/// A customer order.
///
/// `username`, `product_name`, and `unit_price` are denormalized snapshots
/// taken when the order is created; later edits to the customer or product do
/// not flow back into existing orders. `total_price` is computed once at
/// creation as `unit_price * quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(skip)]
    pub row_key: String,
    #[serde(skip)]
    pub etag: Etag,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,

    pub customer_id: String,
    pub username: String,
    pub product_id: String,
    pub product_name: String,
    pub order_date: DateTime<Utc>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub status: String,
}

impl Order {
    /// Status assigned to every newly created order.
    pub const STATUS_SUBMITTED: &'static str = "Submitted";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: String,
        username: String,
        product_id: String,
        product_name: String,
        order_date: DateTime<Utc>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            row_key: Uuid::new_v4().to_string(),
            etag: Etag::default(),
            timestamp: None,
            customer_id,
            username,
            product_id,
            product_name,
            order_date,
            quantity,
            unit_price,
            total_price: unit_price * Decimal::from(quantity),
            status: Self::STATUS_SUBMITTED.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.row_key
    }
}

impl TableEntity for Order {
    fn kind() -> EntityKind {
        EntityKind::Order
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }

    fn set_row_key(&mut self, row_key: String) {
        self.row_key = row_key;
    }

    fn etag(&self) -> &Etag {
        &self.etag
    }

    fn set_etag(&mut self, etag: Etag) {
        self.etag = etag;
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: Option<DateTime<Utc>>) {
        self.timestamp = timestamp;
    }
}
