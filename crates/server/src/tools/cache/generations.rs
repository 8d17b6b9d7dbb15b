//! cache_generations tool implementation.

use portal_cache_core::GenerationInfo;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use crate::tools::{Proxy, json_result};

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGenerationsOutput {
    /// Generation the proxy reads and writes.
    pub current: String,
    pub generations: Vec<GenerationInfo>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(proxy: &Proxy) -> Result<CallToolResult, McpError> {
    let output = CacheGenerationsOutput {
        current: proxy.version_tag().to_string(),
        generations: proxy.storage().generations().await?,
    };
    json_result(&output)
}
