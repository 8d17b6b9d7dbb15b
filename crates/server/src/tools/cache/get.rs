//! cache_get tool implementation.
//!
//! Retrieves the entry stored for a GET request in the current generation.

use std::collections::BTreeMap;

use portal_cache_client::{ProxyRequest, canonicalize};
use portal_cache_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tools::{Proxy, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL of the cached resource. Relative URLs resolve against the origin.
    pub url: String,

    /// Request headers; only the configured identity headers are used.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetOutput {
    pub generation: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// Header values decoded as UTF-8, invalid sequences replaced.
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, invalid sequences replaced.
    pub body: String,
    pub body_bytes: usize,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(proxy: &Proxy, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut request = ProxyRequest::get(url);
    for (name, value) in &params.headers {
        request = request.with_header(name, value)?;
    }

    let generation = proxy.version_tag();
    let identity = request.identity(&proxy.config().identity_headers);
    let stored = proxy
        .storage()
        .match_entry(generation, &identity)
        .await?
        .ok_or_else(|| Error::CacheMiss(identity.to_string()))?;

    let output = CacheGetOutput {
        generation: generation.to_string(),
        url: stored.url,
        status: stored.status,
        status_text: stored.status_text,
        headers: stored
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), String::from_utf8_lossy(value).into_owned()))
            .collect(),
        body: String::from_utf8_lossy(&stored.body).into_owned(),
        body_bytes: stored.body.len(),
        stored_at: stored.stored_at,
    };
    json_result(&output)
}
