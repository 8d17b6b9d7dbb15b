//! Network collaborator for the offline cache proxy.
//!
//! ### Contract
//! - Transport failures (offline, DNS, refused, timeout) are `Err`.
//! - Every HTTP status, 4xx and 5xx included, is an `Ok` response; deciding
//!   what to do with it is the proxy's job.
//!
//! ### Safety Gates
//! - Only `http` and `https` are fetched.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Response Type
//! - Final URL on the configured origin → `basic`, anything else → `cors`.

pub mod url;

use std::time::{Duration, Instant};

use reqwest::{Client, Url};

use portal_cache_core::{AppConfig, Error};

use crate::request::{ProxyRequest, ProxyResponse, ResponseType};

pub use self::url::{UrlError, canonicalize, same_origin};

/// Issues requests on behalf of the proxy.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Origin the page is served from.
    pub origin: Url,

    /// User agent string (default: "portal-cache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            user_agent: "portal-cache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }

    /// Build from the loaded application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::new(origin)
        })
    }
}

/// reqwest-backed `Network` implementation.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        let start = Instant::now();

        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!("unsupported scheme: {}", request.url.scheme())));
        }

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {e}", request.url))
            } else {
                Error::Network(format!("{}: {e}", request.url))
            }
        })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{final_url}: {e}"))
            } else {
                Error::Network(format!("failed to read response: {e}"))
            }
        })?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        let response_type =
            if same_origin(&final_url, &self.config.origin) { ResponseType::Basic } else { ResponseType::Cors };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(ProxyResponse {
            url: final_url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            response_type,
        })
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient").field("config", &self.config).finish()
    }
}
