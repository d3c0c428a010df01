//! Message passing between the front door and the worker.
//!
//! The front door enqueues value-typed [`AuthorizationRequest`]s; the
//! [`TaskProcessor`](crate::processor::TaskProcessor) pulls them one at a time.
//! Delivery is at-least-once at best; duplicates are processed (and audited)
//! independently.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use stationauth_core::AuthorizationRequest;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::error::QueueError;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dequeued {
    Task(AuthorizationRequest),
    /// Nothing arrived within the poll window
    Empty,
    /// No more tasks will ever arrive
    Closed,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, request: AuthorizationRequest) -> Result<(), QueueError>;

    /// Wait up to `wait` for the next task.
    async fn dequeue(&self, wait: Duration) -> Result<Dequeued, QueueError>;
}

/// In-process bounded queue over a tokio channel.
///
/// `enqueue` fails with [`QueueError::Full`] instead of waiting for space.
pub struct ChannelTaskQueue {
    sender: StdMutex<Option<mpsc::Sender<AuthorizationRequest>>>,
    receiver: Mutex<mpsc::Receiver<AuthorizationRequest>>,
}

impl ChannelTaskQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender: StdMutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
        }
    }

    /// Stop accepting tasks. Already queued tasks are still handed out.
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<AuthorizationRequest>> {
        self.sender.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl TaskQueue for ChannelTaskQueue {
    async fn enqueue(&self, request: AuthorizationRequest) -> Result<(), QueueError> {
        let sender = self.sender().ok_or(QueueError::Closed)?;
        // Never wait for space: a stalled worker must not stall producers.
        sender.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    async fn dequeue(&self, wait: Duration) -> Result<Dequeued, QueueError> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(request)) => Ok(Dequeued::Task(request)),
            Ok(None) => Ok(Dequeued::Closed),
            Err(_) => Ok(Dequeued::Empty),
        }
    }
}

/// Queue backed by a Redis list (`LPUSH` to enqueue, `BRPOP` to dequeue).
#[derive(Clone)]
pub struct RedisTaskQueue {
    pool: Pool,
    key: String,
}

impl RedisTaskQueue {
    pub fn new(pool: Pool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, request: AuthorizationRequest) -> Result<(), QueueError> {
        let message = request.to_json()?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        let _: () = conn
            .lpush(&self.key, message)
            .await
            .map_err(|e| QueueError::Command(e.to_string()))?;

        debug!(queue = %self.key, station_id = %request.station_id, "Task enqueued");
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Dequeued, QueueError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        let popped: Option<(String, String)> = conn
            .brpop(&self.key, wait.as_secs_f64())
            .await
            .map_err(|e| QueueError::Command(e.to_string()))?;

        let Some((_, message)) = popped else {
            return Ok(Dequeued::Empty);
        };

        match AuthorizationRequest::from_json(&message) {
            Ok(request) => Ok(Dequeued::Task(request)),
            Err(e) => {
                warn!(
                    queue = %self.key,
                    error = %e,
                    payload = %message,
                    "Dropping undecodable task message"
                );
                Ok(Dequeued::Empty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn request() -> AuthorizationRequest {
        AuthorizationRequest::new(
            Uuid::new_v4(),
            "valid_driver_token_12345",
            "http://callback.url",
            OffsetDateTime::now_utc(),
        )
    }

    #[tokio::test]
    async fn test_channel_queue_preserves_order() {
        let queue = ChannelTaskQueue::new(8);
        let first = request();
        let second = request();

        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        let wait = Duration::from_millis(10);
        assert_eq!(queue.dequeue(wait).await.unwrap(), Dequeued::Task(first));
        assert_eq!(queue.dequeue(wait).await.unwrap(), Dequeued::Task(second));
        assert_eq!(queue.dequeue(wait).await.unwrap(), Dequeued::Empty);
    }

    #[tokio::test]
    async fn test_channel_queue_rejects_when_full() {
        let queue = ChannelTaskQueue::new(1);
        queue.enqueue(request()).await.unwrap();

        assert!(matches!(
            queue.enqueue(request()).await,
            Err(QueueError::Full)
        ));

        // Space frees up once the pending task is taken
        let wait = Duration::from_millis(10);
        assert!(matches!(queue.dequeue(wait).await.unwrap(), Dequeued::Task(_)));
        assert!(queue.enqueue(request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_channel_queue_drains_after_close() {
        let queue = ChannelTaskQueue::new(8);
        let pending = request();
        queue.enqueue(pending.clone()).await.unwrap();
        queue.close();

        assert!(matches!(
            queue.enqueue(request()).await,
            Err(QueueError::Closed)
        ));

        let wait = Duration::from_millis(10);
        assert_eq!(queue.dequeue(wait).await.unwrap(), Dequeued::Task(pending));
        assert_eq!(queue.dequeue(wait).await.unwrap(), Dequeued::Closed);
    }
}
