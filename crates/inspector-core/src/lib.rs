//! # Inspector Core
//!
//! The HTTP vocabulary the inspector interceptor is written against: a
//! buffered [`Request`] with a transport environment, a [`Response`] whose
//! [`Body`] may be full, chunked or streamed, and the [`MiddlewareLayer`]
//! chain that wraps an application handler.
//!
//! Server adapters translate their native request type into [`Request`]
//! and drive a [`LayerStack`] with the application handler as the final
//! [`BoxedNext`].

mod handler;
pub mod middleware;
mod request;
mod response;

pub use handler::handler_fn;
pub use middleware::{BoxFuture, BoxedNext, LayerStack, MiddlewareLayer};
pub use request::Request;
pub use response::{concat, Body, BodyStream, BoxError, IntoResponse, Response};
