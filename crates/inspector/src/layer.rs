//! The interceptor middleware.
//!
//! The wrapped handler runs first, exactly once. Only then are the filters
//! evaluated, and only a reportable exchange is captured and delivered. The
//! handler's status, headers and body are handed back unchanged whether or
//! not reporting succeeds.

use crate::config::{Delivery, InspectorConfig};
use crate::error::{InspectorError, Result};
use crate::payload::Payload;
use crate::sink::DeliverySink;
use crate::snapshot::RequestHead;
use http::{HeaderMap, StatusCode};
use inspector_core::{Body, BoxFuture, BoxedNext, MiddlewareLayer, Request, Response};
use std::sync::Arc;
use tracing::{debug, error};

/// Capture-and-report middleware.
///
/// # Example
///
/// ```ignore
/// use inspector::{sink_from_env, InspectorConfig, Interceptor};
/// use inspector_core::LayerStack;
///
/// let config = InspectorConfig::builder().status(500).build()?;
/// let interceptor = Interceptor::new(config, sink_from_env()?);
///
/// let stack = LayerStack::new().layer(interceptor);
/// ```
#[derive(Clone)]
pub struct Interceptor {
    config: Arc<InspectorConfig>,
    sink: Arc<dyn DeliverySink>,
}

impl Interceptor {
    pub fn new<S: DeliverySink>(config: InspectorConfig, sink: S) -> Self {
        Self::with_shared_sink(config, Arc::new(sink))
    }

    /// Share one sink between several interceptors.
    pub fn with_shared_sink(config: InspectorConfig, sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn DeliverySink> {
        &self.sink
    }

    /// Run one call through the wrapped handler and report it if it matches.
    pub async fn handle(&self, req: Request, next: BoxedNext) -> Response {
        let head = RequestHead::from_request(&req);
        let response = next(req).await;

        let path = head.path();
        let method = head.method().as_str();
        let status = response.status();
        if !self.config.filters().is_reportable(path, method, status.as_u16()) {
            debug!(%method, %path, status = status.as_u16(), "exchange not reportable");
            return response;
        }

        let (parts, mut body) = response.into_parts();
        if let Err(err) = self.report(&head, parts.status, &parts.headers, &mut body).await {
            self.report_failed(&err);
        }
        http::Response::from_parts(parts, body)
    }

    /// Capture and deliver one exchange that has already been judged
    /// reportable.
    ///
    /// `body` is left yielding what it yielded before. With
    /// [`Delivery::Background`] the returned payload has been handed to a
    /// spawned task, and delivery failures go to the error callback instead
    /// of this result.
    pub async fn report(
        &self,
        head: &RequestHead,
        status: StatusCode,
        headers: &HeaderMap,
        body: &mut Body,
    ) -> Result<Payload> {
        let payload = Payload::capture(&self.config, head, status, headers, body).await?;
        let json = payload.to_json()?;

        match self.config.delivery() {
            Delivery::Inline => {
                self.sink.deliver(self.config.key(), &json).await?;
                debug!(
                    report_id = %payload.id,
                    key = %self.config.key(),
                    path = %payload.path,
                    status = payload.status,
                    "report delivered"
                );
            }
            Delivery::Background => {
                let this = self.clone();
                let report_id = payload.id;
                tokio::spawn(async move {
                    match this.sink.deliver(this.config.key(), &json).await {
                        Ok(()) => debug!(%report_id, key = %this.config.key(), "report delivered"),
                        Err(err) => this.report_failed(&InspectorError::from(err)),
                    }
                });
            }
        }

        Ok(payload)
    }

    fn report_failed(&self, err: &InspectorError) {
        error!(error = %err, key = %self.config.key(), "failed to report exchange");
        if let Some(callback) = self.config.on_error() {
            callback(err);
        }
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MiddlewareLayer for Interceptor {
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<Response> {
        let this = self.clone();
        Box::pin(async move { this.handle(req, next).await })
    }
}
