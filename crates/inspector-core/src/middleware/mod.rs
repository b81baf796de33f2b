//! Middleware infrastructure
//!
//! A middleware receives the request together with the rest of the chain
//! ([`BoxedNext`]) and decides when, and whether, to call it.

mod layer;

pub use layer::{BoxFuture, BoxedNext, LayerStack, MiddlewareLayer};
