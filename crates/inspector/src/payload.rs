//! The unit of delivery: one report per reportable exchange.

use crate::config::InspectorConfig;
use crate::error::{CaptureError, DeliveryError};
use crate::snapshot::{RequestHead, RequestSnapshot, ResponseSnapshot};
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use inspector_core::Body;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A captured exchange, serialized as one flat JSON object.
///
/// ```json
/// {
///   "id": "9b2f…", "app": "shop", "host": "web-1",
///   "request_method": "POST", "path": "/hello", "status": 400,
///   "timestamp": "2024-05-01T12:00:00.123Z",
///   "request": { "method": "POST", "path": "/hello", "query_string": "",
///                "params": {}, "body": "", "env": {} },
///   "response": { "status": 400, "headers": {}, "body": "BAD REQUEST" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub id: Uuid,
    pub app: String,
    pub host: String,
    pub request_method: String,
    pub path: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

impl Payload {
    /// Assemble a payload from finished snapshots. Identity and time are
    /// assigned here, so every call yields a distinct report.
    pub fn build(
        config: &InspectorConfig,
        request: RequestSnapshot,
        response: ResponseSnapshot,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            app: config.app_name().to_string(),
            host: config.hostname().to_string(),
            request_method: request.method.clone(),
            path: request.path.clone(),
            status: response.status,
            timestamp: Utc::now(),
            request,
            response,
        }
    }

    /// Snapshot a finished exchange and build its payload.
    ///
    /// `body` may be rewrapped (see [`ResponseSnapshot::capture`]); it
    /// always yields the same content afterwards.
    pub async fn capture(
        config: &InspectorConfig,
        head: &RequestHead,
        status: StatusCode,
        headers: &HeaderMap,
        body: &mut Body,
    ) -> Result<Self, CaptureError> {
        let response = ResponseSnapshot::capture(status, headers, body).await?;
        let request = RequestSnapshot::capture(head);
        Ok(Self::build(config, request, response))
    }

    pub fn to_json(&self) -> Result<String, DeliveryError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DeliveryError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use inspector_core::Request;

    fn config() -> InspectorConfig {
        InspectorConfig::builder()
            .app_name("shop")
            .hostname("web-1")
            .build()
            .unwrap()
    }

    async fn capture(status: StatusCode, body: &'static str) -> Payload {
        let req = Request::from_http(
            http::Request::builder()
                .method("POST")
                .uri("/hello?x=1")
                .body(Bytes::from_static(b"name=value"))
                .unwrap(),
        );
        let head = RequestHead::from_request(&req);
        let mut body = Body::from(body);
        Payload::capture(&config(), &head, status, &HeaderMap::new(), &mut body)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_app_and_host_come_from_config() {
        let payload = capture(StatusCode::BAD_REQUEST, "BAD REQUEST").await;

        assert_eq!(payload.app, "shop");
        assert_eq!(payload.host, "web-1");
        assert_eq!(payload.request_method, "POST");
        assert_eq!(payload.path, "/hello");
        assert_eq!(payload.status, 400);
        assert_eq!(payload.response.status, 400);
        assert_eq!(payload.response.body, "BAD REQUEST");
        assert_eq!(payload.request.body, "name=value");
        assert_eq!(payload.request.query_string, "x=1");
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let a = capture(StatusCode::OK, "OK").await;
        let b = capture(StatusCode::OK, "OK").await;
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.get_version_num(), 4);
    }

    #[tokio::test]
    async fn test_json_field_names() {
        let payload = capture(StatusCode::OK, "OK").await;
        let value: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();

        for field in ["id", "app", "host", "request_method", "path", "status", "timestamp"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
        for field in ["query_string", "params", "body", "env"] {
            assert!(value["request"].get(field).is_some(), "missing request.{}", field);
        }
        for field in ["status", "headers", "body"] {
            assert!(value["response"].get(field).is_some(), "missing response.{}", field);
        }
        assert_eq!(value["status"], 200);
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_json_round_trip_keeps_identity_fields() {
        let payload = capture(StatusCode::BAD_REQUEST, "BAD REQUEST").await;
        let parsed = Payload::from_json(&payload.to_json().unwrap()).unwrap();

        assert_eq!(parsed.app, payload.app);
        assert_eq!(parsed.host, payload.host);
        assert_eq!(parsed.request_method, payload.request_method);
        assert_eq!(parsed.path, payload.path);
        assert_eq!(parsed.status, payload.status);
        assert_eq!(parsed.id, payload.id);
    }
}
