use super::DeliverySink;
use crate::error::DeliveryError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A message seen by channel subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub key: String,
    pub payload: String,
}

/// In-memory sink (not persistent, for testing/dev)
///
/// Keeps one append-only list per key and broadcasts every delivery to
/// current subscribers. Clones share state.
#[derive(Debug, Clone)]
pub struct MemorySink {
    lists: Arc<Mutex<HashMap<String, Vec<String>>>>,
    channel: broadcast::Sender<Published>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            lists: Arc::new(Mutex::new(HashMap::new())),
            channel,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to deliveries made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.channel.subscribe()
    }

    /// Copy of the list stored under `key`, oldest first.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.lists
            .lock()
            .map(|lists| lists.get(key).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.lists
            .lock()
            .map(|lists| lists.get(key).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    /// Remove and return everything stored under `key`.
    pub fn drain(&self, key: &str) -> Vec<String> {
        self.lists
            .lock()
            .map(|mut lists| lists.remove(key).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Make every following delivery fail as if the connection were lost.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    /// Undo [`MemorySink::fail_with`].
    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn deliver(&self, key: &str, payload: &str) -> Result<(), DeliveryError> {
        let failure = self
            .failure
            .lock()
            .map_err(|_| DeliveryError::Backend("Lock poisoned".to_string()))?
            .clone();
        if let Some(message) = failure {
            return Err(DeliveryError::Connection(message));
        }

        self.lists
            .lock()
            .map_err(|_| DeliveryError::Backend("Lock poisoned".to_string()))?
            .entry(key.to_string())
            .or_default()
            .push(payload.to_string());

        // No subscribers is not an error.
        let _ = self.channel.send(Published {
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_appends_in_order() {
        let sink = MemorySink::new();
        sink.deliver("reports", "one").await.unwrap();
        sink.deliver("reports", "two").await.unwrap();
        sink.deliver("other", "three").await.unwrap();

        assert_eq!(sink.list("reports"), vec!["one", "two"]);
        assert_eq!(sink.len("other"), 1);
        assert!(sink.is_empty("missing"));
    }

    #[tokio::test]
    async fn test_subscribers_receive_publications() {
        let sink = MemorySink::new();
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();

        sink.deliver("reports", "payload").await.unwrap();

        let expected = Published {
            key: "reports".to_string(),
            payload: "payload".to_string(),
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let sink = MemorySink::new();
        assert!(sink.deliver("reports", "payload").await.is_ok());
        assert_eq!(sink.drain("reports"), vec!["payload"]);
        assert!(sink.is_empty("reports"));
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let sink = MemorySink::new();
        sink.fail_with("connection refused");

        let err = sink.deliver("reports", "payload").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Connection(ref m) if m == "connection refused"));
        assert!(sink.is_empty("reports"));

        sink.recover();
        assert!(sink.deliver("reports", "payload").await.is_ok());
    }
}
