//! MCP tool implementations.
//!
//! This module contains all tools exposed by the portal-cache server. Each
//! tool drives the shared proxy and renders its result as pretty JSON.

pub mod cache;
pub mod proxy_fetch;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use portal_cache_client::{Network, OfflineCacheProxy};
use portal_cache_core::{CacheStorage, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub use cache::{CacheGetParams, generations_impl, get_impl};
pub use proxy_fetch::{ProxyFetchParams, fetch_impl};
pub use worker::{activate_impl, install_impl, status_impl};

/// Proxy as the server holds it: both collaborators behind trait objects.
pub type Proxy = OfflineCacheProxy<dyn Network, dyn CacheStorage>;

fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
