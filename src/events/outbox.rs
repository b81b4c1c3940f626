//! Durable notification delivery.
//!
//! Writes that must reach a queue first record the intent as an outbox row
//! in the same table store as the entity write. A background dispatcher
//! claims pending rows through the store's version token, pushes the payload
//! to the queue service and marks the row delivered, retrying with
//! exponential backoff until a cap. Queue delivery therefore survives
//! process restarts and transient queue outages.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entities::{EntityKind, TableEntity};
use crate::errors::ServiceError;
use crate::metrics;
use crate::storage::{Etag, StorageClient, OUTBOX_KIND};

pub const MAX_ATTEMPTS: i32 = 8;
const BASE_BACKOFF_SECS: u64 = 2; // exponential backoff base
const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Inflight,
    Delivered,
    Failed,
}

impl OutboxStatus {
    fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Inflight => "inflight",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::Failed => "failed",
        }
    }
}

/// One queued notification intent, stored as a table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    #[serde(skip)]
    pub row_key: String,
    #[serde(skip)]
    pub etag: Etag,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,

    pub queue_name: String,
    pub payload: String,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    /// Earliest instant the dispatcher may pick the message up.
    pub available_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl OutboxMessage {
    pub fn new(queue_name: &str, payload: String) -> Self {
        let now = Utc::now();
        Self {
            row_key: Uuid::new_v4().to_string(),
            etag: Etag::default(),
            timestamp: None,
            queue_name: queue_name.to_string(),
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            created_at: now,
            available_at: now,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.row_key
    }
}

impl TableEntity for OutboxMessage {
    fn kind() -> EntityKind {
        OUTBOX_KIND
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

/// Records the intent to deliver `payload` to `queue_name`. The message
/// reaches the queue once the dispatcher picks it up.
pub async fn enqueue(
    storage: &StorageClient,
    queue_name: &str,
    payload: &Value,
) -> Result<(), ServiceError> {
    let mut message = OutboxMessage::new(queue_name, payload.to_string());
    storage.add_entity(&mut message).await?;
    debug!(queue = %queue_name, outbox_id = %message.id(), "enqueued outbox message");
    Ok(())
}

/// Background dispatcher polling the outbox table.
pub async fn start_worker(storage: StorageClient, poll_interval: Duration) {
    tokio::spawn(async move {
        info!(
            interval_ms = poll_interval.as_millis() as u64,
            "outbox dispatcher started"
        );
        loop {
            match drain_once(&storage, DEFAULT_BATCH_SIZE).await {
                Ok(0) => {}
                Ok(dispatched) => debug!(dispatched, "outbox batch dispatched"),
                Err(e) => error!("outbox dispatch pass failed: {}", e),
            }
            sleep(poll_interval).await;
        }
    });
}

/// One dispatch pass. Returns the number of messages delivered.
pub async fn drain_once(storage: &StorageClient, batch_size: usize) -> Result<usize, ServiceError> {
    let now = Utc::now();
    let all = storage.list_entities::<OutboxMessage>().await?;

    let pending_total = all
        .iter()
        .filter(|m| m.status == OutboxStatus::Pending)
        .count();
    metrics::STORE_METRICS.outbox_pending.set(pending_total as f64);

    let mut due: Vec<OutboxMessage> = all
        .into_iter()
        .filter(|m| m.status == OutboxStatus::Pending && m.available_at <= now)
        .collect();
    due.sort_by_key(|m| m.created_at);
    due.truncate(batch_size);

    let queues = storage.queues();
    let mut dispatched = 0;

    for mut message in due {
        // Claim through the version token; losing the race to another
        // dispatcher just means skipping the message.
        message.status = OutboxStatus::Inflight;
        message.attempts += 1;
        if let Err(e) = storage.update_entity(&mut message).await {
            if e.is_conflict() {
                continue;
            }
            return Err(e.into());
        }

        match queues
            .send_message(&message.queue_name, &message.payload)
            .await
        {
            Ok(()) => {
                message.status = OutboxStatus::Delivered;
                message.last_error = None;
                metrics::STORE_METRICS.outbox_dispatched.inc();
                dispatched += 1;
            }
            Err(e) if message.attempts >= MAX_ATTEMPTS => {
                message.status = OutboxStatus::Failed;
                message.last_error = Some("max attempts exceeded".to_string());
                metrics::STORE_METRICS.outbox_failed.inc();
                warn!(
                    outbox_id = %message.id(),
                    queue = %message.queue_name,
                    attempts = message.attempts,
                    "outbox message failed permanently: {}", e
                );
            }
            Err(e) => {
                message.status = OutboxStatus::Pending;
                message.available_at = next_attempt_at(message.attempts);
                message.last_error = Some(e.to_string());
                metrics::STORE_METRICS.outbox_retries.inc();
                debug!(
                    outbox_id = %message.id(),
                    attempts = message.attempts,
                    retry_at = %message.available_at,
                    "outbox send failed, scheduled retry"
                );
            }
        }

        if let Err(e) = storage.update_entity(&mut message).await {
            warn!(
                outbox_id = %message.id(),
                status = message.status.as_str(),
                "failed updating outbox row: {}", e
            );
        }
    }

    Ok(dispatched)
}

fn next_attempt_at(attempts: i32) -> DateTime<Utc> {
    let backoff = BASE_BACKOFF_SECS.saturating_pow(attempts.max(0) as u32);
    let jitter_ms: i64 = rand::thread_rng().gen_range(0..1000);
    Utc::now()
        + chrono::Duration::seconds(backoff as i64)
        + chrono::Duration::milliseconds(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        InMemoryBlobStore, InMemoryFileShareStore, InMemoryTableStore, QueueStore, StorageError,
        ORDER_NOTIFICATIONS_QUEUE,
    };
    use serde_json::json;
    use std::sync::Arc;

    struct RefusingQueueStore;

    #[async_trait::async_trait]
    impl QueueStore for RefusingQueueStore {
        async fn create_queue_if_absent(&self, _queue: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn send_message(&self, _queue: &str, _payload: &str) -> Result<(), StorageError> {
            Err(StorageError::Transport("queue offline".to_string()))
        }

        async fn receive_message(&self, _queue: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
    }

    fn storage_with_queue(queues: Arc<dyn QueueStore>) -> StorageClient {
        StorageClient::new(
            Arc::new(InMemoryTableStore::new()),
            Arc::new(InMemoryBlobStore::new()),
            queues,
            Arc::new(InMemoryFileShareStore::new()),
        )
    }

    #[tokio::test]
    async fn enqueue_then_drain_delivers_exactly_once() {
        let storage = StorageClient::in_memory();
        enqueue(&storage, ORDER_NOTIFICATIONS_QUEUE, &json!({"order_id": "o-1"}))
            .await
            .unwrap();

        // Nothing reaches the queue until the dispatcher runs.
        assert_eq!(
            storage
                .queues()
                .receive_message(ORDER_NOTIFICATIONS_QUEUE)
                .await
                .unwrap(),
            None
        );

        assert_eq!(drain_once(&storage, 50).await.unwrap(), 1);
        let delivered = storage
            .queues()
            .receive_message(ORDER_NOTIFICATIONS_QUEUE)
            .await
            .unwrap()
            .unwrap();
        let payload: serde_json::Value = serde_json::from_str(&delivered).unwrap();
        assert_eq!(payload["order_id"], "o-1");

        // A second pass finds nothing due.
        assert_eq!(drain_once(&storage, 50).await.unwrap(), 0);
        let messages = storage.list_entities::<OutboxMessage>().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, OutboxStatus::Delivered);
        assert_eq!(messages[0].attempts, 1);
    }

    #[tokio::test]
    async fn failed_send_backs_off_and_keeps_the_message() {
        let storage = storage_with_queue(Arc::new(RefusingQueueStore));
        enqueue(&storage, ORDER_NOTIFICATIONS_QUEUE, &json!({"order_id": "o-2"}))
            .await
            .unwrap();

        assert_eq!(drain_once(&storage, 50).await.unwrap(), 0);
        let messages = storage.list_entities::<OutboxMessage>().await.unwrap();
        assert_eq!(messages[0].status, OutboxStatus::Pending);
        assert_eq!(messages[0].attempts, 1);
        assert!(messages[0].available_at > Utc::now());
        assert!(messages[0]
            .last_error
            .as_deref()
            .unwrap_or_default()
            .contains("queue offline"));

        // Not due yet, so an immediate pass leaves it untouched.
        assert_eq!(drain_once(&storage, 50).await.unwrap(), 0);
        let messages = storage.list_entities::<OutboxMessage>().await.unwrap();
        assert_eq!(messages[0].attempts, 1);
    }

    #[tokio::test]
    async fn message_fails_permanently_after_max_attempts() {
        let storage = storage_with_queue(Arc::new(RefusingQueueStore));
        let mut message =
            OutboxMessage::new(ORDER_NOTIFICATIONS_QUEUE, json!({"n": 1}).to_string());
        message.attempts = MAX_ATTEMPTS - 1;
        storage.add_entity(&mut message).await.unwrap();

        assert_eq!(drain_once(&storage, 50).await.unwrap(), 0);
        let messages = storage.list_entities::<OutboxMessage>().await.unwrap();
        assert_eq!(messages[0].status, OutboxStatus::Failed);
        assert_eq!(messages[0].attempts, MAX_ATTEMPTS);
        assert_eq!(
            messages[0].last_error.as_deref(),
            Some("max attempts exceeded")
        );

        // Failed messages are terminal.
        assert_eq!(drain_once(&storage, 50).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delivery_follows_creation_order() {
        let storage = StorageClient::in_memory();
        for n in 1..=3 {
            enqueue(&storage, ORDER_NOTIFICATIONS_QUEUE, &json!({"n": n}))
                .await
                .unwrap();
        }

        assert_eq!(drain_once(&storage, 50).await.unwrap(), 3);
        for n in 1..=3 {
            let delivered = storage
                .queues()
                .receive_message(ORDER_NOTIFICATIONS_QUEUE)
                .await
                .unwrap()
                .unwrap();
            let payload: serde_json::Value = serde_json::from_str(&delivered).unwrap();
            assert_eq!(payload["n"], n);
        }
    }

    #[tokio::test]
    async fn batch_size_caps_one_pass() {
        let storage = StorageClient::in_memory();
        for n in 1..=5 {
            enqueue(&storage, ORDER_NOTIFICATIONS_QUEUE, &json!({"n": n}))
                .await
                .unwrap();
        }

        assert_eq!(drain_once(&storage, 2).await.unwrap(), 2);
        assert_eq!(drain_once(&storage, 50).await.unwrap(), 3);
    }
}
