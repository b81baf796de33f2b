//! Immutable snapshots of a live request and response.
//!
//! The request side is captured in two steps. [`RequestHead`] is a cheap
//! copy taken before dispatch (the buffered body is reference counted, so
//! the handler keeps its own untouched view). [`RequestSnapshot::capture`]
//! renders that copy after the handler has returned.
//!
//! The response side is rendered from the live [`Body`]. Buffered bodies
//! are copied; a one-shot stream is drained and put back in place as an
//! equivalent chunk sequence so the caller still receives every chunk.

use crate::error::CaptureError;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use inspector_core::{concat, Body, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Pre-dispatch copy of everything a report needs from the request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    env: HashMap<String, Value>,
    body: Bytes,
}

impl RequestHead {
    /// Copy the head of a request without consuming its body.
    pub fn from_request(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
            env: req.env().clone(),
            body: req.body().cloned().unwrap_or_default(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query_string(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Request half of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub params: HashMap<String, String>,
    pub body: String,
    pub env: HashMap<String, String>,
}

impl RequestSnapshot {
    pub fn capture(head: &RequestHead) -> Self {
        Self {
            method: head.method.as_str().to_string(),
            path: head.path().to_string(),
            query_string: head.query_string().to_string(),
            params: params(head),
            body: String::from_utf8_lossy(&head.body).into_owned(),
            env: string_env(&head.env),
        }
    }
}

/// Query parameters merged with form-encoded body parameters. The body
/// wins when a name appears in both; within one source the last pair wins.
fn params(head: &RequestHead) -> HashMap<String, String> {
    let mut params = HashMap::new();
    params.extend(decode_pairs(head.query_string()));

    let is_form = head
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false);
    if is_form {
        match std::str::from_utf8(&head.body) {
            Ok(body) => params.extend(decode_pairs(body)),
            Err(_) => tracing::debug!("form body is not valid UTF-8; skipping body params"),
        }
    }

    params
}

fn decode_pairs(input: &str) -> Vec<(String, String)> {
    if input.is_empty() {
        return Vec::new();
    }
    serde_urlencoded::from_str::<Vec<(String, String)>>(input).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "unparsable url-encoded parameters");
        Vec::new()
    })
}

/// Keep only string-valued environment entries.
fn string_env(env: &HashMap<String, Value>) -> HashMap<String, String> {
    env.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

/// Response half of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ResponseSnapshot {
    /// Render a response. `body` is left holding content equivalent to
    /// what it held before, even when rendering fails part way through a
    /// stream.
    pub async fn capture(
        status: StatusCode,
        headers: &HeaderMap,
        body: &mut Body,
    ) -> Result<Self, CaptureError> {
        Ok(Self {
            status: status.as_u16(),
            headers: render_headers(headers),
            body: render_body(body).await?,
        })
    }
}

/// Header names to values; repeated headers are joined with `", "`.
pub fn render_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut rendered = HashMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let value = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        rendered.insert(name.as_str().to_string(), value);
    }
    rendered
}

/// Render a body to a single string without changing what it yields.
pub async fn render_body(body: &mut Body) -> Result<String, CaptureError> {
    match std::mem::take(body) {
        Body::Full(bytes) => {
            let rendered = String::from_utf8_lossy(&bytes).into_owned();
            *body = Body::Full(bytes);
            Ok(rendered)
        }
        Body::Chunks(chunks) => {
            let rendered = String::from_utf8_lossy(&concat(&chunks)).into_owned();
            *body = Body::Chunks(chunks);
            Ok(rendered)
        }
        Body::Stream(mut producer) => {
            let mut chunks = Vec::new();
            while let Some(item) = producer.next().await {
                match item {
                    Ok(chunk) => chunks.push(chunk),
                    Err(err) => {
                        let message = err.to_string();
                        // Replay what was read, then the same failure.
                        let replay = chunks.into_iter().map(Ok).chain(std::iter::once(Err(err)));
                        *body = Body::Stream(Box::pin(stream::iter(replay)));
                        return Err(CaptureError::Body(message));
                    }
                }
            }
            let rendered = String::from_utf8_lossy(&concat(&chunks)).into_owned();
            *body = Body::Chunks(chunks);
            Ok(rendered)
        }
    }
}
