//! proxy_fetch tool implementation.
//!
//! Dispatches a fetch event through the proxy, as a page request would.

use std::collections::BTreeMap;

use portal_cache_client::{FetchOutcome, Method, ProxyRequest, ResponseSource, ResponseType, canonicalize};
use portal_cache_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Proxy, json_result};

/// Input parameters for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// URL to request. Relative URLs resolve against the origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as UTF-8 text.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for proxy_fetch tool.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyFetchOutput {
    /// Final URL of the response.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    /// Header values decoded as UTF-8, invalid sequences replaced.
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, invalid sequences replaced.
    pub body: String,
    pub source: ResponseSource,
    /// Whether a copy was written to the cache.
    pub cached: bool,
}

impl From<FetchOutcome> for ProxyFetchOutput {
    fn from(outcome: FetchOutcome) -> Self {
        let response = outcome.response;
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        Self {
            url: response.url.to_string(),
            status: response.status,
            status_text: response.status_text,
            response_type: response.response_type,
            headers,
            body: String::from_utf8_lossy(&response.body).into_owned(),
            source: outcome.source,
            cached: outcome.cached,
        }
    }
}

/// Build the page request described by `params`.
pub fn build_request(origin: &Url, params: ProxyFetchParams) -> Result<ProxyRequest, Error> {
    let url = canonicalize(&params.url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = params.method.trim().to_ascii_uppercase();
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("invalid method {:?}: {e}", params.method)))?;

    let mut request = ProxyRequest::new(method, url);
    for (name, value) in &params.headers {
        request = request.with_header(name, value)?;
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }
    Ok(request)
}

/// Implementation of the proxy_fetch tool.
pub async fn fetch_impl(proxy: &Proxy, origin: &Url, params: ProxyFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(origin, params)?;
    tracing::debug!(method = %request.method, url = %request.url, "proxy_fetch");

    let outcome = proxy.fetch(&request).await?;
    json_result(&ProxyFetchOutput::from(outcome))
}
