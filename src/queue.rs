use serde::{Serialize, de::DeserializeOwned};
use tokio::{sync::mpsc, task::JoinHandle};

use std::{
    collections::HashMap,
    future::Future,
    sync::{Mutex, PoisonError},
};

use crate::error::QueueError;

struct QueueSlot {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Option<mpsc::Receiver<Vec<u8>>>,
}

/// In-process broker with named queues.
///
/// Payloads cross the queue as JSON bytes, so producers and consumers only
/// share the message schema. Each queue buffers up to `capacity` messages and
/// delivers them to a single consumer in publish order.
pub struct Broker {
    capacity: usize,
    queues: Mutex<HashMap<String, QueueSlot>>,
}

impl Broker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn declare(&self, queue: &str) {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.entry(queue.to_string()).or_insert_with(|| {
            tracing::info!("Declared queue '{}'", queue);
            let (tx, rx) = mpsc::channel(self.capacity);
            QueueSlot { tx, rx: Some(rx) }
        });
    }

    pub async fn publish<T: Serialize>(&self, queue: &str, message: &T) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(message)?;

        let tx = {
            let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            queues
                .get(queue)
                .map(|slot| slot.tx.clone())
                .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?
        };

        tx.send(payload)
            .await
            .map_err(|_| QueueError::Closed(queue.to_string()))?;

        tracing::debug!("Published message to queue '{}'", queue);
        Ok(())
    }

    /// Registers `handler` as the consumer of `queue`.
    ///
    /// The returned task decodes every payload into `T` and awaits the handler
    /// before taking the next message. Payloads that fail to decode are logged
    /// and dropped.
    pub fn subscribe<T, F, Fut>(&self, queue: &str, handler: F) -> Result<JoinHandle<()>, QueueError>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = {
            let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = queues
                .get_mut(queue)
                .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;
            slot.rx
                .take()
                .ok_or_else(|| QueueError::AlreadyConsumed(queue.to_string()))?
        };

        let name = queue.to_string();
        tracing::info!("Registered consumer on queue '{}'", name);

        Ok(tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                match serde_json::from_slice::<T>(&payload) {
                    Ok(message) => handler(message).await,
                    Err(e) => {
                        tracing::error!("Dropping undecodable message on queue '{}': {e}", name);
                    }
                }
            }
            tracing::info!("Queue '{}' closed, consumer stopping", name);
        }))
    }
}
