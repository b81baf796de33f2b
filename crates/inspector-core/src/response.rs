//! Response types for the inspector pipeline
//!
//! A response body is one of three shapes:
//!
//! | Variant | Description |
//! |---------|-------------|
//! | [`Body::Full`] | A single buffered value |
//! | [`Body::Chunks`] | An ordered, already materialized chunk sequence |
//! | [`Body::Stream`] | A lazy, one-shot producer of chunks |
//!
//! Handlers return anything implementing [`IntoResponse`]:
//!
//! ```rust,ignore
//! use http::{HeaderMap, StatusCode};
//!
//! async fn hello() -> (StatusCode, &'static str) {
//!     (StatusCode::OK, "Hello")
//! }
//!
//! async fn with_headers() -> (StatusCode, HeaderMap, String) {
//!     let mut headers = HeaderMap::new();
//!     headers.insert("X-Custom", "value".parse().unwrap());
//!     (StatusCode::OK, headers, "Hello".to_string())
//! }
//! ```

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use std::fmt;
use std::pin::Pin;

/// Boxed error produced by a streaming body
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A one-shot stream of body chunks
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// HTTP Response type
pub type Response = http::Response<Body>;

/// Response body
pub enum Body {
    /// A single buffered value
    Full(Bytes),
    /// A materialized sequence of chunks, in order
    Chunks(Vec<Bytes>),
    /// A lazy producer that can be read once
    Stream(BodyStream),
}

impl Body {
    /// An empty body
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }

    /// Wrap a stream of chunks
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Body::Stream(Box::pin(
            stream.map(|item| item.map_err(Into::<BoxError>::into)),
        ))
    }

    /// Whether reading this body consumes it
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Drain the body into a single buffer
    pub async fn collect(self) -> Result<Bytes, BoxError> {
        match self {
            Body::Full(bytes) => Ok(bytes),
            Body::Chunks(chunks) => Ok(concat(&chunks)),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

/// Concatenate chunks in order
pub fn concat(chunks: &[Bytes]) -> Bytes {
    match chunks {
        [] => Bytes::new(),
        [single] => single.clone(),
        _ => {
            let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
            for chunk in chunks {
                buf.extend_from_slice(chunk);
            }
            buf.freeze()
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            Body::Chunks(chunks) => f.debug_tuple("Chunks").field(chunks).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Full(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Full(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::Full(Bytes::from(v))
    }
}

impl From<Vec<Bytes>> for Body {
    fn from(chunks: Vec<Bytes>) -> Self {
        Body::Chunks(chunks)
    }
}

/// Trait for types that can be converted into an HTTP response
pub trait IntoResponse {
    /// Convert self into a Response
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        http::Response::new(self)
    }
}

// 200 OK with empty body
impl IntoResponse for () {
    fn into_response(self) -> Response {
        http::Response::new(Body::empty())
    }
}

fn text(body: Body) -> Response {
    let mut response = http::Response::new(body);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        text(self.into())
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        text(self.into())
    }
}

impl IntoResponse for Bytes {
    fn into_response(self) -> Response {
        http::Response::new(self.into())
    }
}

impl IntoResponse for Vec<u8> {
    fn into_response(self) -> Response {
        http::Response::new(self.into())
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = http::Response::new(Body::empty());
        *response.status_mut() = self;
        response
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, R) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;
        response
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, HeaderMap, R) {
    fn into_response(self) -> Response {
        let mut response = self.2.into_response();
        *response.status_mut() = self.0;
        response.headers_mut().extend(self.1);
        response
    }
}
