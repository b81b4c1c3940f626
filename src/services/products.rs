use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::Product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::storage::{StorageClient, PRODUCT_IMAGES_CONTAINER};

/// Request/Response types for the product service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub product_name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock_available: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateProductRequest {
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock_available: Option<i32>,
    /// Version token from a previous read; omitted means "replace what is
    /// there now".
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: String,
    pub product_name: String,
    pub description: String,
    pub price: Decimal,
    pub stock_available: i32,
    pub image_url: String,
    pub version: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.row_key,
            product_name: product.product_name,
            description: product.description,
            price: product.price,
            stock_available: product.stock_available,
            image_url: product.image_url,
            version: product.etag.to_string(),
            updated_at: product.timestamp,
        }
    }
}

/// Price quote for a prospective order line.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
    pub stock_available: i32,
    pub in_stock: bool,
}

/// Service for managing the product catalog
#[derive(Clone)]
pub struct ProductService {
    storage: StorageClient,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductService {
    /// Creates a new product service instance
    pub fn new(storage: StorageClient, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            storage,
            event_sender,
        }
    }

    /// Lists all catalog products
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductResponse>, ServiceError> {
        let products = self.storage.list_entities::<Product>().await?;
        Ok(products.into_iter().map(ProductResponse::from).collect())
    }

    /// Gets a product by id
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        product_id: &str,
    ) -> Result<Option<ProductResponse>, ServiceError> {
        let product = self.storage.get_entity::<Product>(product_id).await?;
        Ok(product.map(ProductResponse::from))
    }

    /// Creates a new catalog product
    #[instrument(skip(self, request), fields(product_name = %request.product_name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        check_price(request.price)?;
        check_stock(request.stock_available)?;

        let mut product = Product::new(
            request.product_name,
            request.description,
            request.price,
            request.stock_available,
        );
        self.storage.add_entity(&mut product).await?;

        info!(product_id = %product.id(), "Product created successfully");
        self.send_event(Event::ProductCreated(product.id().to_string()))
            .await;
        Ok(ProductResponse::from(product))
    }

    /// Replaces a product's fields
    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: &str,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        let mut product = self
            .storage
            .get_entity::<Product>(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(product_name) = request.product_name {
            if product_name.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Product name is required".to_string(),
                ));
            }
            product.product_name = product_name;
        }
        if let Some(description) = request.description {
            product.description = description;
        }
        if let Some(price) = request.price {
            check_price(price)?;
            product.price = price;
        }
        if let Some(stock_available) = request.stock_available {
            check_stock(stock_available)?;
            product.stock_available = stock_available;
        }
        if let Some(version) = request.version {
            product.etag = version.into();
        }

        self.storage.update_entity(&mut product).await?;

        info!(product_id = %product.id(), "Product updated successfully");
        self.send_event(Event::ProductUpdated(product.id().to_string()))
            .await;
        Ok(ProductResponse::from(product))
    }

    /// Deletes a product and its image blob
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: &str) -> Result<(), ServiceError> {
        let product = self
            .storage
            .get_entity::<Product>(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        self.storage.delete_entity::<Product>(product_id).await?;
        self.delete_image_blob(&product.image_url).await;

        info!(product_id = %product_id, "Product deleted successfully");
        self.send_event(Event::ProductDeleted(product_id.to_string()))
            .await;
        Ok(())
    }

    /// Stores a product image and records its URI on the product.
    ///
    /// The blob is named `{uuid}.{ext}` so re-uploads never collide; the
    /// previous image blob, if any, is removed afterwards.
    #[instrument(skip(self, content), fields(product_id = %product_id, file_name = %file_name))]
    pub async fn upload_product_image(
        &self,
        product_id: &str,
        file_name: &str,
        content: Bytes,
    ) -> Result<ProductResponse, ServiceError> {
        if content.is_empty() {
            return Err(ServiceError::ValidationError(
                "Please select an image file to upload".to_string(),
            ));
        }

        let mut product = self
            .storage
            .get_entity::<Product>(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let blob_name = match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
            None => Uuid::new_v4().to_string(),
        };
        let uri = self
            .storage
            .blobs()
            .upload(PRODUCT_IMAGES_CONTAINER, &blob_name, content)
            .await?;

        let previous = std::mem::replace(&mut product.image_url, uri);
        self.storage.update_entity(&mut product).await?;
        self.delete_image_blob(&previous).await;

        info!(product_id = %product.id(), blob = %blob_name, "Product image stored");
        self.send_event(Event::ProductUpdated(product.id().to_string()))
            .await;
        Ok(ProductResponse::from(product))
    }

    /// Quotes the total price for a quantity of one product
    #[instrument(skip(self), fields(product_id = %product_id, quantity = quantity))]
    pub async fn price_quote(
        &self,
        product_id: &str,
        quantity: i32,
    ) -> Result<QuoteResponse, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = self
            .storage
            .get_entity::<Product>(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        Ok(QuoteResponse {
            product_id: product.row_key,
            product_name: product.product_name,
            unit_price: product.price,
            quantity,
            total_price: product.price * Decimal::from(quantity),
            stock_available: product.stock_available,
            in_stock: product.stock_available >= quantity,
        })
    }

    /// Removes an image blob referenced by `image_url`, if any. Failures are
    /// logged and swallowed; the catalog row is already consistent.
    async fn delete_image_blob(&self, image_url: &str) {
        if image_url.is_empty() {
            return;
        }
        let Some(blob_name) = image_url.rsplit('/').next() else {
            return;
        };
        if let Err(e) = self
            .storage
            .blobs()
            .delete(PRODUCT_IMAGES_CONTAINER, blob_name)
            .await
        {
            warn!(image_url = %image_url, "failed deleting product image blob: {}", e);
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send product event");
            }
        }
    }
}

fn check_price(price: Decimal) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must be greater than $0.00".to_string(),
        ));
    }
    Ok(())
}

fn check_stock(stock_available: i32) -> Result<(), ServiceError> {
    if stock_available < 0 {
        return Err(ServiceError::ValidationError(
            "Stock available cannot be negative".to_string(),
        ));
    }
    Ok(())
}
