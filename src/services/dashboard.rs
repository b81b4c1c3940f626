use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::entities::{Customer, Order, Product};
use crate::errors::ServiceError;
use crate::metrics;
use crate::services::products::ProductResponse;
use crate::storage::{
    ReadinessReport, StorageClient, ORDER_NOTIFICATIONS_QUEUE, STOCK_UPDATES_QUEUE,
};

/// Landing-page summary: a shelf of featured products plus store totals.
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub featured_products: Vec<ProductResponse>,
    pub product_count: usize,
    pub customer_count: usize,
    pub order_count: usize,
}

/// Number of products shown on the landing shelf.
const FEATURED_PRODUCT_COUNT: usize = 5;

/// Service for the storefront dashboard and storage administration
#[derive(Clone)]
pub struct DashboardService {
    storage: StorageClient,
}

impl DashboardService {
    /// Creates a new dashboard service instance
    pub fn new(storage: StorageClient) -> Self {
        Self { storage }
    }

    /// Builds the landing-page summary
    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let (products, customers, orders) = tokio::try_join!(
            self.storage.list_entities::<Product>(),
            self.storage.list_entities::<Customer>(),
            self.storage.list_entities::<Order>(),
        )?;

        let product_count = products.len();
        let featured_products = products
            .into_iter()
            .take(FEATURED_PRODUCT_COUNT)
            .map(ProductResponse::from)
            .collect();

        Ok(DashboardSummary {
            featured_products,
            product_count,
            customer_count: customers.len(),
            order_count: orders.len(),
        })
    }

    /// Provisions all storage resources
    #[instrument(skip(self))]
    pub async fn init_storage(&self) -> Result<ReadinessReport, ServiceError> {
        let report = self.storage.ensure_ready().await?;
        info!("storage initialization requested via API");
        Ok(report)
    }

    /// Pops one message off a notification queue for inspection. The message
    /// is consumed; this mirrors the queue service's destructive receive.
    #[instrument(skip(self), fields(queue = %queue))]
    pub async fn receive_queue_message(
        &self,
        queue: &str,
    ) -> Result<Option<serde_json::Value>, ServiceError> {
        if queue != ORDER_NOTIFICATIONS_QUEUE && queue != STOCK_UPDATES_QUEUE {
            return Err(ServiceError::ValidationError(format!(
                "Unknown queue '{}'",
                queue
            )));
        }

        let payload = self.storage.queues().receive_message(queue).await?;
        metrics::STORE_METRICS.queue_receives.inc();
        Ok(payload.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        }))
    }
}
