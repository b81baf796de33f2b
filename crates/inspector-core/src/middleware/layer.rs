//! Middleware chain for the request/response pipeline
//!
//! Each [`MiddlewareLayer`] receives the request and a [`BoxedNext`] that
//! continues the chain. The final `BoxedNext` is the wrapped application
//! handler.

use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The rest of a middleware chain, ending in the application handler
pub type BoxedNext = Arc<dyn Fn(Request) -> BoxFuture<Response> + Send + Sync>;

/// A middleware wrapping the rest of the chain.
///
/// Implementations are shared behind an `Arc` by every chain built from a
/// [`LayerStack`], so per-call state belongs in the returned future.
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Handle `req`, calling `next` zero or more times to continue the chain
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<Response>;
}

impl<F> MiddlewareLayer for F
where
    F: Fn(Request, BoxedNext) -> BoxFuture<Response> + Send + Sync + 'static,
{
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<Response> {
        self(req, next)
    }
}

/// Ordered middleware, outermost first.
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Arc<dyn MiddlewareLayer>>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`LayerStack::push`].
    pub fn layer<L: MiddlewareLayer>(mut self, layer: L) -> Self {
        self.push(layer);
        self
    }

    /// Add `layer` inside every layer already on the stack.
    pub fn push<L: MiddlewareLayer>(&mut self, layer: L) {
        self.layers.push(Arc::new(layer));
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Wrap `handler` in every layer, producing a reusable chain.
    pub fn wrap(&self, handler: BoxedNext) -> BoxedNext {
        self.layers.iter().rev().fold(handler, |next, layer| {
            let layer = Arc::clone(layer);
            Arc::new(move |req: Request| layer.call(req, next.clone()))
        })
    }

    /// Run one request through the stack and `handler`.
    pub fn execute(&self, req: Request, handler: BoxedNext) -> BoxFuture<Response> {
        self.wrap(handler)(req)
    }
}

impl std::fmt::Debug for LayerStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerStack")
            .field("layers", &self.layers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{Body, IntoResponse};
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn create_test_request(method: Method, path: &str) -> Request {
        let req = http::Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .unwrap();
        Request::from_http(req)
    }

    fn status_handler(status: StatusCode) -> BoxedNext {
        Arc::new(move |_req: Request| {
            Box::pin(async move { (status, Body::from("test")).into_response() })
                as BoxFuture<Response>
        })
    }

    type Order = Arc<Mutex<Vec<(usize, &'static str)>>>;

    /// Records when it runs relative to the handler
    struct OrderTrackingMiddleware {
        id: usize,
        order: Order,
    }

    impl MiddlewareLayer for OrderTrackingMiddleware {
        fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<Response> {
            let id = self.id;
            let order = self.order.clone();

            Box::pin(async move {
                order.lock().unwrap().push((id, "pre"));
                let response = next(req).await;
                order.lock().unwrap().push((id, "post"));
                response
            })
        }
    }

    /// Answers without calling the rest of the chain
    struct ShortCircuitMiddleware {
        status: StatusCode,
    }

    impl MiddlewareLayer for ShortCircuitMiddleware {
        fn call(&self, _req: Request, _next: BoxedNext) -> BoxFuture<Response> {
            let status = self.status;
            Box::pin(async move { status.into_response() })
        }
    }

    #[tokio::test]
    async fn test_empty_layer_stack_calls_handler_directly() {
        let stack = LayerStack::new();
        assert!(stack.is_empty());

        let request = create_test_request(Method::GET, "/test");
        let response = stack.execute(request, status_handler(StatusCode::OK)).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrapped_chain_is_reusable() {
        let order: Order = Arc::new(Mutex::new(Vec::new()));
        let stack = LayerStack::new()
            .layer(OrderTrackingMiddleware {
                id: 0,
                order: order.clone(),
            })
            .layer(OrderTrackingMiddleware {
                id: 1,
                order: order.clone(),
            });
        assert_eq!(stack.len(), 2);

        let chain = stack.wrap(status_handler(StatusCode::OK));
        for _ in 0..2 {
            chain(create_test_request(Method::GET, "/test")).await;
        }

        let order = order.lock().unwrap();
        let once = [(0, "pre"), (1, "pre"), (1, "post"), (0, "post")];
        assert_eq!(order.as_slice(), [once, once].concat().as_slice());
    }

    #[tokio::test]
    async fn test_closure_middleware_sees_response() {
        let stack = LayerStack::new().layer(|req: Request, next: BoxedNext| {
            Box::pin(async move {
                let mut response = next(req).await;
                response
                    .headers_mut()
                    .insert("x-wrapped", http::HeaderValue::from_static("yes"));
                response
            }) as BoxFuture<Response>
        });

        let request = create_test_request(Method::GET, "/test");
        let response = stack.execute(request, status_handler(StatusCode::CREATED)).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-wrapped"], "yes");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler() {
        let called = Arc::new(AtomicBool::new(false));
        let mut stack = LayerStack::new();
        stack.push(ShortCircuitMiddleware {
            status: StatusCode::FORBIDDEN,
        });

        let flag = called.clone();
        let handler: BoxedNext = Arc::new(move |_req: Request| {
            let flag = flag.clone();
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                StatusCode::OK.into_response()
            }) as BoxFuture<Response>
        });

        let request = create_test_request(Method::GET, "/test");
        let response = stack.execute(request, handler).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!called.load(Ordering::SeqCst));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_layers_preserve_handler_status(handler_status in 200u16..600u16) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let order: Order = Arc::new(Mutex::new(Vec::new()));
                let mut stack = LayerStack::new();
                stack.push(OrderTrackingMiddleware { id: 1, order: order.clone() });

                let status = StatusCode::from_u16(handler_status).unwrap();
                let request = create_test_request(Method::GET, "/test");
                let response = stack.execute(request, status_handler(status)).await;

                prop_assert_eq!(response.status(), status);
                let order = order.lock().unwrap();
                prop_assert_eq!(order.as_slice(), &[(1, "pre"), (1, "post")][..]);
                Ok(())
            });
            result?;
        }

        #[test]
        fn prop_middleware_execution_order(num_layers in 1usize..10usize) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let order: Order = Arc::new(Mutex::new(Vec::new()));
                let mut stack = LayerStack::new();
                for id in 0..num_layers {
                    stack.push(OrderTrackingMiddleware { id, order: order.clone() });
                }

                let request = create_test_request(Method::GET, "/test");
                stack.execute(request, status_handler(StatusCode::OK)).await;

                let order = order.lock().unwrap();
                prop_assert_eq!(order.len(), num_layers * 2);
                for i in 0..num_layers {
                    prop_assert_eq!(order[i], (i, "pre"));
                    prop_assert_eq!(order[num_layers + i], (num_layers - 1 - i, "post"));
                }
                Ok(())
            });
            result?;
        }
    }
}
