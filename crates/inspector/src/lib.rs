//! # Inspector
//!
//! An HTTP interceptor that sits between the server and the application
//! handler, selects exchanges that match configured criteria, and reports
//! each one as a JSON document to a durable list and a live channel.
//!
//! ```ignore
//! use inspector::{sink_from_env, InspectorConfig, Interceptor};
//! use inspector_core::{handler_fn, LayerStack, Request};
//! use http::StatusCode;
//!
//! let config = InspectorConfig::builder()
//!     .path("^/hello")
//!     .method("POST")
//!     .status(400)
//!     .build()?;
//!
//! let stack = LayerStack::new().layer(Interceptor::new(config, sink_from_env()?));
//!
//! let app = handler_fn(|_req: Request| async { (StatusCode::BAD_REQUEST, "BAD REQUEST") });
//! let response = stack.execute(request, app).await;
//! ```
//!
//! # Filters
//!
//! Three independent dimensions: path patterns (regular expressions; any
//! may match), methods (case-sensitive), and response statuses. An empty
//! dimension matches everything; configured dimensions must all match.
//!
//! # Delivery
//!
//! Every report is pushed onto the list named by the configured key
//! (`"reports"` by default) and published on the channel of the same name.
//! Delivery is inline by default; [`Delivery::Background`] moves it onto a
//! spawned task. Failures never change the response returned to the
//! caller; they are logged and passed to the optional error callback.

mod config;
mod error;
mod filter;
mod layer;
mod payload;
pub mod sink;
mod snapshot;

pub use config::{
    Delivery, ErrorCallback, InspectorConfig, InspectorConfigBuilder, PathPattern, DEFAULT_KEY,
    ENV_PREFIX,
};
pub use error::{CaptureError, ConfigError, DeliveryError, InspectorError, Result};
pub use filter::Filters;
pub use layer::Interceptor;
pub use payload::Payload;
#[cfg(feature = "redis")]
pub use sink::{sink_from_env, RedisSink};
pub use sink::{redis_url_from_env, DeliverySink, MemorySink, Published};
pub use snapshot::{render_body, render_headers, RequestHead, RequestSnapshot, ResponseSnapshot};
