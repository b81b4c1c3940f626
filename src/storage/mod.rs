/*!
 * Storage facade over the four backing primitives.
 *
 * The application persists through one [`StorageClient`] that bundles a
 * table store (keyed entities with optimistic concurrency), a blob store
 * (product images, payment proofs), a queue service (order and stock
 * notifications) and a file share (payment documents). Each primitive is a
 * trait object, so backends are chosen at construction time from
 * configuration and swapped wholesale in tests.
 *
 * Construction is cheap and performs no network calls. [`StorageClient::ensure_ready`]
 * provisions every named resource and is run once at startup, off the
 * request path.
 */

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{EntityKind, TableEntity};

pub mod blobs;
pub mod files;
pub mod queues;
pub mod tables;

pub use blobs::{BlobStore, InMemoryBlobStore, LocalBlobStore};
pub use files::{FileShareStore, InMemoryFileShareStore, LocalFileShareStore};
pub use queues::{InMemoryQueueStore, QueueStore, RedisQueueStore};
pub use tables::{Etag, InMemoryTableStore, TableRow, TableStore};

/// Blob container holding product catalog images.
pub const PRODUCT_IMAGES_CONTAINER: &str = "product-images";
/// Blob container holding uploaded payment proofs.
pub const PAYMENT_PROOFS_CONTAINER: &str = "payment-proofs";
/// Queue notified once per created order.
pub const ORDER_NOTIFICATIONS_QUEUE: &str = "order-notifications";
/// Queue notified once per stock level change.
pub const STOCK_UPDATES_QUEUE: &str = "stock-updates";
/// File share holding customer documents.
pub const CONTRACTS_SHARE: &str = "contracts";
/// Directory under the contracts share for payment documents.
pub const PAYMENTS_DIRECTORY: &str = "payments";
/// Auxiliary table kind backing the notification outbox.
pub const OUTBOX_KIND: EntityKind = EntityKind::Custom("OutboxMessage");

/// Failures surfaced by any storage primitive.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("duplicate key for {resource}")]
    DuplicateKey { resource: String },

    #[error("version token mismatch on {resource}")]
    Conflict { resource: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage transport error: {0}")]
    Transport(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(table: &str, partition_key: &str, row_key: &str) -> Self {
        StorageError::NotFound {
            resource: format!("{} row {}/{}", table, partition_key, row_key),
        }
    }

    pub fn duplicate_key(table: &str, partition_key: &str, row_key: &str) -> Self {
        StorageError::DuplicateKey {
            resource: format!("{} row {}/{}", table, partition_key, row_key),
        }
    }

    pub fn conflict(table: &str, partition_key: &str, row_key: &str) -> Self {
        StorageError::Conflict {
            resource: format!("{} row {}/{}", table, partition_key, row_key),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(e: redis::RedisError) -> Self {
        StorageError::Transport(e.to_string())
    }
}

/// Resources provisioned by [`StorageClient::ensure_ready`].
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ReadinessReport {
    pub tables: Vec<String>,
    pub containers: Vec<String>,
    pub queues: Vec<String>,
    pub shares: Vec<String>,
}

/// Handle bundling the four storage primitives.
///
/// Cloning is cheap; all backends sit behind `Arc`.
#[derive(Clone)]
pub struct StorageClient {
    tables: Arc<dyn TableStore>,
    blobs: Arc<dyn BlobStore>,
    queues: Arc<dyn QueueStore>,
    files: Arc<dyn FileShareStore>,
}

impl StorageClient {
    pub fn new(
        tables: Arc<dyn TableStore>,
        blobs: Arc<dyn BlobStore>,
        queues: Arc<dyn QueueStore>,
        files: Arc<dyn FileShareStore>,
    ) -> Self {
        Self {
            tables,
            blobs,
            queues,
            files,
        }
    }

    /// A client with every primitive held in process memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryTableStore::new()),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(InMemoryQueueStore::new()),
            Arc::new(InMemoryFileShareStore::new()),
        )
    }

    /// Builds a client from configuration.
    ///
    /// `storage_connection` selects the entity/blob/share backends
    /// (`memory://` or a `file://{root}` tree); `queue_backend` picks the
    /// queue service independently, since notification queues are commonly
    /// externalized first.
    pub async fn connect(config: &AppConfig) -> Result<Self, StorageError> {
        let queues: Arc<dyn QueueStore> = match config.queue_backend.to_ascii_lowercase().as_str()
        {
            "redis" => Arc::new(
                RedisQueueStore::connect(&config.redis_url, &config.queue_namespace).await?,
            ),
            _ => Arc::new(InMemoryQueueStore::new()),
        };

        let conn = config.storage_connection.trim();
        let (tables, blobs, files): (
            Arc<dyn TableStore>,
            Arc<dyn BlobStore>,
            Arc<dyn FileShareStore>,
        ) = if conn == "memory://" || conn == "in-memory" {
            (
                Arc::new(InMemoryTableStore::new()),
                Arc::new(InMemoryBlobStore::new()),
                Arc::new(InMemoryFileShareStore::new()),
            )
        } else if let Some(root) = conn.strip_prefix("file://") {
            let root = PathBuf::from(root);
            (
                Arc::new(InMemoryTableStore::new()),
                Arc::new(LocalBlobStore::new(root.join("blobs"))),
                Arc::new(LocalFileShareStore::new(root.join("shares"))),
            )
        } else {
            return Err(StorageError::Transport(format!(
                "unsupported storage connection '{}'",
                conn
            )));
        };

        info!(
            storage = %conn,
            queue_backend = %config.queue_backend,
            "storage client constructed"
        );
        Ok(Self::new(tables, blobs, queues, files))
    }

    pub fn tables(&self) -> Arc<dyn TableStore> {
        Arc::clone(&self.tables)
    }

    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.blobs)
    }

    pub fn queues(&self) -> Arc<dyn QueueStore> {
        Arc::clone(&self.queues)
    }

    pub fn files(&self) -> Arc<dyn FileShareStore> {
        Arc::clone(&self.files)
    }

    /// Provisions every table, container, queue and share the application
    /// uses. Safe to call repeatedly.
    pub async fn ensure_ready(&self) -> Result<ReadinessReport, StorageError> {
        let mut report = ReadinessReport::default();

        for kind in [
            EntityKind::Customer,
            EntityKind::Product,
            EntityKind::Order,
            OUTBOX_KIND,
        ] {
            let table = kind.collection_name();
            self.tables.create_table_if_absent(&table).await?;
            report.tables.push(table);
        }

        for container in [PRODUCT_IMAGES_CONTAINER, PAYMENT_PROOFS_CONTAINER] {
            self.blobs.create_container_if_absent(container).await?;
            report.containers.push(container.to_string());
        }

        for queue in [ORDER_NOTIFICATIONS_QUEUE, STOCK_UPDATES_QUEUE] {
            self.queues.create_queue_if_absent(queue).await?;
            report.queues.push(queue.to_string());
        }

        self.files
            .create_directory_if_absent(CONTRACTS_SHARE, PAYMENTS_DIRECTORY)
            .await?;
        report
            .shares
            .push(format!("{}/{}", CONTRACTS_SHARE, PAYMENTS_DIRECTORY));

        info!(
            tables = report.tables.len(),
            containers = report.containers.len(),
            queues = report.queues.len(),
            shares = report.shares.len(),
            "storage resources provisioned"
        );
        Ok(report)
    }

    /// Every stored entity of `T`'s kind.
    pub async fn list_entities<T: TableEntity>(&self) -> Result<Vec<T>, StorageError> {
        let rows = self.tables.list_rows(&T::kind().collection_name()).await?;
        rows.into_iter().map(from_row).collect()
    }

    /// One entity by row key, or `None` when absent.
    pub async fn get_entity<T: TableEntity>(
        &self,
        row_key: &str,
    ) -> Result<Option<T>, StorageError> {
        let kind = T::kind();
        let row = self
            .tables
            .get_row(&kind.collection_name(), kind.partition_key(), row_key)
            .await?;
        row.map(from_row).transpose()
    }

    /// Inserts `entity`, assigning a row key when it has none, and writes
    /// the store-assigned version token and timestamp back onto it.
    pub async fn add_entity<T: TableEntity>(&self, entity: &mut T) -> Result<(), StorageError> {
        if entity.row_key().is_empty() {
            entity.set_row_key(Uuid::new_v4().to_string());
        }
        let stored = self
            .tables
            .insert_row(&T::kind().collection_name(), to_row(entity)?)
            .await?;
        entity.set_etag(stored.etag);
        entity.set_timestamp(stored.timestamp);
        Ok(())
    }

    /// Full-replace update guarded by the entity's own version token. Set
    /// the token to [`Etag::wildcard`] first to force the write through.
    /// On success the fresh token and timestamp are written back.
    pub async fn update_entity<T: TableEntity>(&self, entity: &mut T) -> Result<(), StorageError> {
        let expected = entity.etag().clone();
        let stored = self
            .tables
            .update_row(&T::kind().collection_name(), to_row(entity)?, &expected)
            .await?;
        entity.set_etag(stored.etag);
        entity.set_timestamp(stored.timestamp);
        Ok(())
    }

    /// Deletes one entity row. Absent rows fail with `NotFound`.
    pub async fn delete_entity<T: TableEntity>(&self, row_key: &str) -> Result<(), StorageError> {
        let kind = T::kind();
        self.tables
            .delete_row(&kind.collection_name(), kind.partition_key(), row_key)
            .await
    }
}

fn to_row<T: TableEntity>(entity: &T) -> Result<TableRow, StorageError> {
    let mut row = TableRow::new(
        T::kind().partition_key(),
        entity.row_key(),
        serde_json::to_value(entity)?,
    );
    row.etag = entity.etag().clone();
    row.timestamp = entity.timestamp();
    Ok(row)
}

fn from_row<T: TableEntity>(row: TableRow) -> Result<T, StorageError> {
    let mut entity: T = serde_json::from_value(row.data)?;
    entity.set_row_key(row.row_key);
    entity.set_etag(row.etag);
    entity.set_timestamp(row.timestamp);
    Ok(entity)
}
