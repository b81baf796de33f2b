use super::DeliverySink;
use crate::error::DeliveryError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Redis-backed sink: `RPUSH` onto a list and `PUBLISH` on a channel,
/// both named by the delivery key.
///
/// One multiplexed connection is shared by all clones and opened on first
/// use. A failed command drops it so the next delivery reconnects; the
/// failed delivery itself is not retried.
#[derive(Clone)]
pub struct RedisSink {
    client: Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisSink {
    /// Parse `url` without connecting.
    pub fn open(url: &str) -> Result<Self, DeliveryError> {
        let client = Client::open(url).map_err(|e| DeliveryError::Connection(e.to_string()))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, DeliveryError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DeliveryError::Connection(e.to_string()))?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        self.connection.lock().await.take();
    }
}

#[async_trait]
impl DeliverySink for RedisSink {
    async fn deliver(&self, key: &str, payload: &str) -> Result<(), DeliveryError> {
        let mut conn = self.connection().await?;

        let result = redis::pipe()
            .atomic()
            .rpush(key, payload)
            .ignore()
            .publish(key, payload)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await;

        if let Err(e) = result {
            self.reset().await;
            return Err(if e.is_io_error() || e.is_connection_dropped() {
                DeliveryError::Connection(e.to_string())
            } else {
                DeliveryError::Backend(e.to_string())
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for RedisSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSink")
            .field("addr", &self.client.get_connection_info().addr)
            .finish()
    }
}
