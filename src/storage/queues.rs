/*!
 * Queue service: named FIFO message queues with destructive receive.
 *
 * `receive_message` removes the message it returns, so each message is
 * observed at most once. Consumers that need retry semantics keep their own
 * delivery state (see the outbox dispatcher).
 */

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::StorageError;

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Lazily creates the queue; repeated calls are no-ops.
    async fn create_queue_if_absent(&self, queue: &str) -> Result<(), StorageError>;

    /// Appends a message to the back of the queue.
    async fn send_message(&self, queue: &str, payload: &str) -> Result<(), StorageError>;

    /// Removes and returns the front message, or `None` when the queue is
    /// empty or unknown.
    async fn receive_message(&self, queue: &str) -> Result<Option<String>, StorageError>;
}

const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// In-memory queue service with a per-queue size cap.
#[derive(Debug)]
pub struct InMemoryQueueStore {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    max_size: usize,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_QUEUE_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            max_size,
        }
    }

    /// Test hook: number of pending messages in a queue.
    pub fn len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().unwrap();
        queues.get(queue).map_or(0, VecDeque::len)
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn create_queue_if_absent(&self, queue: &str) -> Result<(), StorageError> {
        let mut queues = self.queues.lock().unwrap();
        queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn send_message(&self, queue: &str, payload: &str) -> Result<(), StorageError> {
        let mut queues = self.queues.lock().unwrap();
        let messages = queues.entry(queue.to_string()).or_default();

        if messages.len() >= self.max_size {
            return Err(StorageError::Transport(format!("queue {} is full", queue)));
        }

        messages.push_back(payload.to_string());
        Ok(())
    }

    async fn receive_message(&self, queue: &str) -> Result<Option<String>, StorageError> {
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.get_mut(queue).and_then(VecDeque::pop_front))
    }
}

/// Queue service backed by Redis lists, one list per queue under a shared
/// key namespace. Send is LPUSH, receive is RPOP, so the list behaves as a
/// FIFO queue end to end.
pub struct RedisQueueStore {
    manager: ConnectionManager,
    namespace: String,
}

impl RedisQueueStore {
    pub async fn connect(redis_url: &str, namespace: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        debug!(namespace = %namespace, "connected redis queue backend");
        Ok(Self {
            manager,
            namespace: namespace.to_string(),
        })
    }

    fn queue_key(&self, queue: &str) -> String {
        format!("{}:{}", self.namespace, queue)
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn create_queue_if_absent(&self, _queue: &str) -> Result<(), StorageError> {
        // Redis lists spring into existence on first push; a ping verifies
        // the backend is reachable before traffic arrives.
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    async fn send_message(&self, queue: &str, payload: &str) -> Result<(), StorageError> {
        let mut conn = self.manager.clone();
        redis::cmd("LPUSH")
            .arg(self.queue_key(queue))
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn receive_message(&self, queue: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.manager.clone();
        let payload: Option<String> = redis::cmd("RPOP")
            .arg(self.queue_key(queue))
            .query_async(&mut conn)
            .await?;
        Ok(payload)
    }
}
