//! worker_install, worker_activate and worker_status tool implementations.
//!
//! Lifecycle events are dispatched by the caller; the proxy never installs
//! or activates on its own after startup.

use portal_cache_client::WorkerState;
use portal_cache_core::GenerationInfo;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use super::{Proxy, json_result};

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatusOutput {
    pub state: WorkerState,
    pub version_tag: String,
    /// Whether fetches go through the cache policy.
    pub controlling: bool,
    pub generations: Vec<GenerationInfo>,
}

/// Implementation of the worker_install tool.
pub async fn install_impl(proxy: &Proxy) -> Result<CallToolResult, McpError> {
    let report = proxy.install().await?;
    json_result(&report)
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl(proxy: &Proxy) -> Result<CallToolResult, McpError> {
    let report = proxy.activate().await?;
    json_result(&report)
}

/// Implementation of the worker_status tool.
pub async fn status_impl(proxy: &Proxy) -> Result<CallToolResult, McpError> {
    let output = WorkerStatusOutput {
        state: proxy.state().await,
        version_tag: proxy.version_tag().to_string(),
        controlling: proxy.is_controlling().await,
        generations: proxy.storage().generations().await?,
    };
    json_result(&output)
}
