//! Request types for the inspector pipeline

use bytes::Bytes;
use http::{request::Parts, Extensions, HeaderMap, Method, Uri, Version};
use serde_json::Value;
use std::collections::HashMap;

/// HTTP Request wrapper
///
/// Holds the request head, a fully buffered body and a transport-level
/// environment. The environment is seeded with CGI-style entries derived
/// from the request line and headers; server adapters may add their own
/// entries, which need not be strings.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Option<Bytes>,
    pub(crate) env: HashMap<String, Value>,
}

impl Request {
    /// Create a new request from parts and a buffered body
    pub fn new(parts: Parts, body: Bytes) -> Self {
        let env = seed_env(&parts);
        Self {
            parts,
            body: Some(body),
            env,
        }
    }

    /// Create a request from an `http::Request` with a buffered body
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body)
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Get the raw query string, empty when the URI has none
    pub fn query_string(&self) -> &str {
        self.parts.uri.query().unwrap_or("")
    }

    /// Borrow the buffered body without consuming it
    ///
    /// Returns `None` once [`Request::take_body`] has been called.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Take the body bytes (can only be called once)
    pub fn take_body(&mut self) -> Option<Bytes> {
        self.body.take()
    }

    /// Get the transport environment
    pub fn env(&self) -> &HashMap<String, Value> {
        &self.env
    }

    /// Get the mutable transport environment
    pub fn env_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.env
    }

    /// Insert a single environment entry
    pub fn insert_env(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.env.insert(key.into(), value.into());
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        Self::from_http(req)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .finish()
    }
}

/// Build the CGI-style environment for a request head.
fn seed_env(parts: &Parts) -> HashMap<String, Value> {
    let uri = &parts.uri;
    let mut env = HashMap::new();

    env.insert("REQUEST_METHOD".to_string(), Value::from(parts.method.as_str()));
    env.insert("PATH_INFO".to_string(), Value::from(uri.path()));
    env.insert(
        "QUERY_STRING".to_string(),
        Value::from(uri.query().unwrap_or("")),
    );
    env.insert(
        "REQUEST_URI".to_string(),
        Value::from(uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")),
    );
    env.insert(
        "SERVER_PROTOCOL".to_string(),
        Value::from(format!("{:?}", parts.version)),
    );

    let authority = uri.authority().map(|a| a.as_str().to_string()).or_else(|| {
        parts
            .headers
            .get(http::header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    });
    if let Some(authority) = authority {
        let (name, port) = match authority.rsplit_once(':') {
            Some((name, port)) if port.parse::<u16>().is_ok() => (name.to_string(), port.to_string()),
            _ => {
                let default_port = if uri.scheme_str() == Some("https") { "443" } else { "80" };
                (authority.clone(), default_port.to_string())
            }
        };
        env.insert("SERVER_NAME".to_string(), Value::from(name));
        env.insert("SERVER_PORT".to_string(), Value::from(port));
    }

    for name in parts.headers.keys() {
        let key = match name.as_str() {
            "content-type" => "CONTENT_TYPE".to_string(),
            "content-length" => "CONTENT_LENGTH".to_string(),
            other => format!("HTTP_{}", other.to_uppercase().replace('-', "_")),
        };

        let values: Vec<&http::HeaderValue> = parts.headers.get_all(name).iter().collect();
        let text: Option<Vec<&str>> = values.iter().map(|v| v.to_str().ok()).collect();
        let value = match text {
            Some(text) => Value::from(text.join(", ")),
            None => {
                tracing::trace!(header = %name, "header value is not valid UTF-8");
                Value::from(
                    values
                        .iter()
                        .flat_map(|v| v.as_bytes().iter().copied())
                        .collect::<Vec<u8>>(),
                )
            }
        };
        env.insert(key, value);
    }

    env
}
