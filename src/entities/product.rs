use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityKind, TableEntity};
use crate::storage::tables::Etag;

/// A catalog product.
///
/// `price` is a fixed-point decimal and must be positive; `stock_available`
/// may never go negative. `image_url` is empty until an image is uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(skip)]
    pub row_key: String,
    #[serde(skip)]
    pub etag: Etag,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,

    pub product_name: String,
    pub description: String,
    pub price: Decimal,
    pub stock_available: i32,
    #[serde(default)]
    pub image_url: String,
}

impl Product {
    pub fn new(
        product_name: String,
        description: String,
        price: Decimal,
        stock_available: i32,
    ) -> Self {
        Self {
            row_key: Uuid::new_v4().to_string(),
            etag: Etag::default(),
            timestamp: None,
            product_name,
            description,
            price,
            stock_available,
            image_url: String::new(),
        }
    }

    /// Public identifier; an alias for the row key.
    pub fn id(&self) -> &str {
        &self.row_key
    }
}

impl TableEntity for Product {
    fn kind() -> EntityKind {
        EntityKind::Product
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
