//! Fixtures for tool tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use portal_cache_client::{Network, OfflineCacheProxy, ProxyConfig, ProxyRequest, ProxyResponse};
use portal_cache_core::{CacheStorage, Error, MemoryCacheStorage};
use url::Url;

use super::Proxy;

pub const VERSION: &str = "portal-cache-v1";

pub fn origin() -> Url {
    Url::parse("http://localhost:8080").unwrap()
}

pub fn local(path: &str) -> Url {
    origin().join(path).unwrap()
}

/// Serves fixed bodies by URL until switched offline.
#[derive(Default)]
pub struct FixtureNetwork {
    pages: Mutex<HashMap<String, ProxyResponse>>,
    offline: AtomicBool,
}

impl FixtureNetwork {
    pub fn page(&self, path: &str, status: u16, body: &str) {
        let url = local(path);
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), ProxyResponse::basic(url, status, body.to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Network for FixtureNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }
        self.pages
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::Network(format!("{}: connection refused", request.url)))
    }
}

/// Proxy over a fixture network serving the shell at `/` and `/index.html`.
pub fn fixture() -> (Arc<FixtureNetwork>, Arc<MemoryCacheStorage>, Arc<Proxy>) {
    let network = Arc::new(FixtureNetwork::default());
    network.page("/", 200, "<html>shell</html>");
    network.page("/index.html", 200, "<html>portal</html>");
    let storage = Arc::new(MemoryCacheStorage::new());

    let config = ProxyConfig::new(VERSION, vec![local("/"), local("/index.html")]);
    let dyn_network: Arc<dyn Network> = network.clone();
    let dyn_storage: Arc<dyn CacheStorage> = storage.clone();
    let proxy = Arc::new(OfflineCacheProxy::new(dyn_network, dyn_storage, config));
    (network, storage, proxy)
}

/// JSON payload of a successful tool result.
pub fn result_json(result: &rmcp::model::CallToolResult) -> serde_json::Value {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
