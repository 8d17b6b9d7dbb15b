//! portal-cache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use portal_cache_client::{FetchClient, FetchConfig, Network, OfflineCacheProxy, ProxyConfig};
use portal_cache_core::{AppConfig, CacheDb, CacheStorage};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use url::Url;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        version_tag = %config.version_tag,
        origin = %config.origin,
        db_path = %config.db_path.display(),
        "Starting portal-cache server on stdio transport"
    );

    let origin = Url::parse(&config.origin)?;
    let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open(&config.db_path).await?);
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?);
    let proxy = Arc::new(OfflineCacheProxy::new(network, storage, ProxyConfig::from_app_config(&config)?));

    if config.install_on_start {
        match proxy.install().await {
            Ok(_) => {
                if let Err(e) = proxy.activate().await {
                    tracing::warn!(error = %e, "activation on start failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "install on start failed, serving uncontrolled"),
        }
    }

    let handler = handler::PortalCacheServer::new(proxy, origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
