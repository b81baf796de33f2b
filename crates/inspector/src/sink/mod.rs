//! Delivery sinks.
//!
//! A sink receives every serialized payload under one key, appending it to
//! a durable list and publishing it on a live channel of the same name.
//! The interceptor is a producer only; consumers drain the list or
//! subscribe to the channel independently.

use crate::error::DeliveryError;
use async_trait::async_trait;
use std::sync::Arc;

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::{MemorySink, Published};
#[cfg(feature = "redis")]
pub use self::redis::RedisSink;

/// Environment variable holding the Redis connection URL for
/// [`sink_from_env`].
pub const REDIS_URL_ENV: &str = "REDIS_INSPECT_URL";

/// Connection URL used when [`REDIS_URL_ENV`] is not set.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

/// Destination for serialized payloads.
///
/// Implementations must be safe to call concurrently. Failures are
/// returned to the caller; a sink does not retry or buffer.
#[async_trait]
pub trait DeliverySink: Send + Sync + 'static {
    /// Append `payload` to the list `key` and publish it on channel `key`.
    async fn deliver(&self, key: &str, payload: &str) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<S: DeliverySink + ?Sized> DeliverySink for Arc<S> {
    async fn deliver(&self, key: &str, payload: &str) -> Result<(), DeliveryError> {
        (**self).deliver(key, payload).await
    }
}

/// Connection URL from [`REDIS_URL_ENV`] (after loading `.env`), falling
/// back to [`DEFAULT_REDIS_URL`].
pub fn redis_url_from_env() -> String {
    let _ = dotenvy::dotenv();
    std::env::var(REDIS_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string())
}

/// Resolve the default Redis sink from the environment.
///
/// Call this explicitly when assembling the interceptor; nothing inside
/// the pipeline does so implicitly.
#[cfg(feature = "redis")]
pub fn sink_from_env() -> Result<RedisSink, DeliveryError> {
    let url = redis_url_from_env();
    tracing::debug!(url = %redact_url(&url), "resolving redis sink");
    RedisSink::open(&url)
}

/// Hide credentials in a connection URL for logging.
#[cfg_attr(not(feature = "redis"), allow(dead_code))]
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
