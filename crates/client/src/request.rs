//! Request and response model seen by the proxy.
//!
//! Bodies are `Bytes`, so duplicating a response for the cache is a
//! reference-count bump; the caller's copy is never consumed by the write.

use bytes::Bytes;
use portal_cache_core::{Error, RequestIdentity, StoredResponse};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

/// A request intercepted from the page.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Add a header. Invalid names or values are rejected as input errors.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| Error::InvalidInput(format!("invalid header value: {e}")))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Identity used to address this request in the cache.
    ///
    /// Only headers listed in `identity_headers` that the request carries
    /// take part; values that are not visible ASCII are skipped.
    pub fn identity(&self, identity_headers: &[String]) -> RequestIdentity {
        identity_headers
            .iter()
            .filter_map(|name| {
                self.headers
                    .get(name.as_str())
                    .and_then(|v| v.to_str().ok())
                    .map(|v| (name, v))
            })
            .fold(RequestIdentity::new(self.method.as_str(), self.url.as_str()), |id, (name, value)| {
                id.with_header(name, value)
            })
    }
}

/// Classification of where a response came from, as a page would see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response with readable status and body.
    Basic,
    /// Cross-origin response the page may read.
    Cors,
    /// Cross-origin response hidden from the page (status 0).
    Opaque,
    /// Network error surfaced as a response object.
    Error,
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseType::Basic => write!(f, "basic"),
            ResponseType::Cors => write!(f, "cors"),
            ResponseType::Opaque => write!(f, "opaque"),
            ResponseType::Error => write!(f, "error"),
        }
    }
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub url: Url,
    /// 0 for opaque and error responses.
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub response_type: ResponseType,
}

impl ProxyResponse {
    /// Same-origin response with the given status and body.
    pub fn basic(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string();
        Self { url, status, status_text, headers: HeaderMap::new(), body: body.into(), response_type: ResponseType::Basic }
    }

    /// Opaque cross-origin response: status 0, no headers, empty body.
    pub fn opaque(url: Url) -> Self {
        Self {
            url,
            status: 0,
            status_text: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            response_type: ResponseType::Opaque,
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Snapshot for storage. Header values are kept as raw bytes.
    pub fn to_stored(&self) -> StoredResponse {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        StoredResponse {
            url: self.url.to_string(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers,
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored snapshot.
    ///
    /// Only basic responses are ever stored, so the result is `Basic`.
    pub fn from_stored(stored: StoredResponse) -> Result<Self, Error> {
        let url = Url::parse(&stored.url).map_err(|e| Error::Serialization(format!("stored url: {e}")))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &stored.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Serialization(format!("stored header name: {e}")))?;
            let value = HeaderValue::from_bytes(value)
                .map_err(|e| Error::Serialization(format!("stored header value: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self {
            url,
            status: stored.status,
            status_text: stored.status_text,
            headers,
            body: Bytes::from(stored.body),
            response_type: ResponseType::Basic,
        })
    }
}
