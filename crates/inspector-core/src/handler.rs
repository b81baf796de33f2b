//! Adapting async functions into the handler capability

use crate::middleware::{BoxFuture, BoxedNext};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use std::future::Future;
use std::sync::Arc;

/// Lift an async function into a [`BoxedNext`] that can terminate a
/// middleware chain.
///
/// # Example
///
/// ```rust,ignore
/// use inspector_core::{handler_fn, Request};
/// use http::StatusCode;
///
/// let handler = handler_fn(|_req: Request| async { (StatusCode::OK, "OK") });
/// ```
pub fn handler_fn<F, Fut, R>(f: F) -> BoxedNext
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |req: Request| {
        let fut = f(req);
        Box::pin(async move { fut.await.into_response() }) as BoxFuture<Response>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;

    #[tokio::test]
    async fn test_handler_fn_converts_output() {
        let handler = handler_fn(|req: Request| async move {
            let path = req.path().to_string();
            (StatusCode::ACCEPTED, path)
        });

        let req = http::Request::builder()
            .uri("/jobs")
            .body(Bytes::new())
            .unwrap();
        let response = handler(Request::from_http(req)).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = response.into_body().collect().await.unwrap();
        assert_eq!(body, Bytes::from("/jobs"));
    }
}
