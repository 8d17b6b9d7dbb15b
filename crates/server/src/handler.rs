//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    CacheGetParams, Proxy, ProxyFetchParams, activate_impl, fetch_impl, generations_impl, get_impl, install_impl,
    status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use url::Url;

/// The main MCP server handler for portal-cache.
#[derive(Clone)]
pub struct PortalCacheServer {
    proxy: Arc<Proxy>,
    origin: Url,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl PortalCacheServer {
    /// Create a new server handler around a shared proxy.
    pub fn new(proxy: Arc<Proxy>, origin: Url) -> Self {
        Self { proxy, origin, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Dispatch the install event: precache the manifest into the current generation. Fails without partial state if any resource cannot be fetched."
    )]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.proxy).await
    }

    #[tool(description = "Dispatch the activate event: delete every cache generation except the current one.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.proxy).await
    }

    #[tool(description = "Report lifecycle state, version tag and cache generations.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.proxy).await
    }

    /// Fetch through the proxy.
    ///
    /// Network first; a failed request falls back to the cached copy.
    #[tool(
        description = "Fetch a URL through the offline cache proxy. Network first, cached copy on network failure. Returns status, headers, body, and whether it came from the cache."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.proxy, &self.origin, params.0).await
    }

    #[tool(description = "Look up the cached response for a GET request in the current generation.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.proxy, &self.origin, params.0).await
    }

    #[tool(description = "List cache generations with their entry counts.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.proxy).await
    }
}

impl ServerHandler for PortalCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "portal-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
