use thiserror::Error;

/// Invalid construction input. Fatal: the interceptor cannot be built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("non-regular-expression in path filter: {pattern:?}: {source}")]
    InvalidPathPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid status code in status filter: {0}")]
    InvalidStatus(u16),

    #[error("invalid delivery mode: {0:?} (expected \"inline\" or \"background\")")]
    InvalidDelivery(String),

    #[error("environment configuration error: {0}")]
    Env(#[from] envy::Error),
}

/// Failure while materializing a request or response for a report.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Failure to hand a payload to the sink.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sink connection error: {0}")]
    Connection(String),

    #[error("sink backend error: {0}")]
    Backend(String),
}

/// Any failure on the reporting side path of a call.
#[derive(Debug, Error)]
pub enum InspectorError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

pub type Result<T> = std::result::Result<T, InspectorError>;
