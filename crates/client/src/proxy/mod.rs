//! Offline cache proxy.
//!
//! Sits between the page and the network and applies a network-first policy
//! with cache fallback:
//!
//! - **install** precaches the manifest into the generation named by the
//!   version tag, all or nothing.
//! - **activate** sweeps every other generation.
//! - **fetch** goes to the network; successful basic GET responses are
//!   copied into the current generation, and when the network fails the
//!   stored snapshot for the request identity is served instead.
//!
//! Both collaborators are injected, so the proxy holds no ambient state
//! beyond its lifecycle.

mod lifecycle;
pub mod state;

pub use lifecycle::{ActivateReport, InstallReport};
pub use state::WorkerState;

use std::sync::Arc;

use portal_cache_core::{AppConfig, CacheStorage, Error};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use crate::classify::{ResponseClass, classify};
use crate::fetch::{Network, canonicalize};
use crate::request::{ProxyRequest, ProxyResponse};
use state::Lifecycle;

/// Static configuration of a proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Name of the current generation.
    pub version_tag: String,
    /// Absolute URLs precached on install, without duplicates.
    pub manifest: Vec<Url>,
    /// Schemes whose responses are never cached.
    pub excluded_schemes: Vec<String>,
    /// Request headers that take part in the request identity.
    pub identity_headers: Vec<String>,
}

impl ProxyConfig {
    pub fn new(version_tag: impl Into<String>, manifest: Vec<Url>) -> Self {
        let mut unique: Vec<Url> = Vec::with_capacity(manifest.len());
        for url in manifest {
            if !unique.contains(&url) {
                unique.push(url);
            }
        }
        Self {
            version_tag: version_tag.into(),
            manifest: unique,
            excluded_schemes: vec!["chrome-extension".to_string()],
            identity_headers: Vec::new(),
        }
    }

    /// Resolve the configured manifest against the origin.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let manifest = config
            .precache_manifest
            .iter()
            .map(|path| canonicalize(path, &origin).map_err(|e| Error::InvalidUrl(format!("{path}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            excluded_schemes: config.excluded_schemes.clone(),
            identity_headers: config.identity_headers.clone(),
            ..Self::new(config.version_tag.clone(), manifest)
        })
    }
}

/// Where a fetch result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// Result of a fetch event.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: ProxyResponse,
    pub source: ResponseSource,
    /// Whether a copy of the network response was written to the cache.
    pub cached: bool,
}

/// Network-first proxy over a versioned response cache.
pub struct OfflineCacheProxy<N: Network + ?Sized, S: CacheStorage + ?Sized> {
    network: Arc<N>,
    storage: Arc<S>,
    config: ProxyConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl<N: Network + ?Sized, S: CacheStorage + ?Sized> OfflineCacheProxy<N, S> {
    pub fn new(network: Arc<N>, storage: Arc<S>, config: ProxyConfig) -> Self {
        Self { network, storage, config, lifecycle: Mutex::new(Lifecycle::default()) }
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.lock().await.state
    }

    /// Whether fetches are intercepted (an activation has completed).
    pub async fn is_controlling(&self) -> bool {
        self.lifecycle.lock().await.controlling
    }

    pub fn version_tag(&self) -> &str {
        &self.config.version_tag
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Handle a fetch event.
    ///
    /// Before the first activation the request goes straight to the network
    /// without caching or fallback.
    ///
    /// # Errors
    ///
    /// Returns the network error when the network fails and the current
    /// generation holds no entry for the request.
    pub async fn fetch(&self, request: &ProxyRequest) -> Result<FetchOutcome, Error> {
        let generation = self.config.version_tag.as_str();

        if !self.is_controlling().await {
            let response = self.network.fetch(request).await?;
            return Ok(FetchOutcome { response, source: ResponseSource::Network, cached: false });
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                let cached = match classify(request, &response, &self.config.excluded_schemes) {
                    ResponseClass::Cacheable => self.store(generation, request, &response).await,
                    ResponseClass::Ineligible(reason) => {
                        tracing::debug!(url = %request.url, %reason, "response not cached");
                        false
                    }
                    ResponseClass::Error => {
                        tracing::debug!(url = %request.url, "error response not cached");
                        false
                    }
                };
                Ok(FetchOutcome { response, source: ResponseSource::Network, cached })
            }
            Err(err) => self.fallback(generation, request, err).await,
        }
    }

    /// Write a copy of `response` under the request identity.
    ///
    /// Failures are logged and reported as `false`; the caller's response is
    /// unaffected.
    async fn store(&self, generation: &str, request: &ProxyRequest, response: &ProxyResponse) -> bool {
        let identity = request.identity(&self.config.identity_headers);
        let snapshot = response.to_stored();
        match self.storage.put(generation, &identity, &snapshot).await {
            Ok(()) => {
                tracing::debug!(generation, %identity, bytes = snapshot.body.len(), "cached response");
                true
            }
            Err(e) => {
                tracing::warn!(generation, %identity, error = %e, "cache write failed");
                false
            }
        }
    }

    async fn fallback(&self, generation: &str, request: &ProxyRequest, err: Error) -> Result<FetchOutcome, Error> {
        let identity = request.identity(&self.config.identity_headers);

        let stored = match self.storage.match_entry(generation, &identity).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                tracing::debug!(generation, %identity, error = %err, "network failed, no cached entry");
                return Err(err);
            }
            Err(e) => {
                tracing::warn!(generation, %identity, error = %e, "cache lookup failed after network failure");
                return Err(err);
            }
        };

        match ProxyResponse::from_stored(stored) {
            Ok(response) => {
                tracing::debug!(generation, %identity, error = %err, "network failed, serving cached entry");
                Ok(FetchOutcome { response, source: ResponseSource::Cache, cached: false })
            }
            Err(e) => {
                tracing::warn!(generation, %identity, error = %e, "cached entry unreadable");
                Err(err)
            }
        }
    }

    async fn begin(&self, next: WorkerState, allowed: fn(&WorkerState) -> bool) -> Result<WorkerState, Error> {
        let mut lifecycle = self.lifecycle.lock().await;
        let current = lifecycle.state;
        if !allowed(&current) {
            return Err(Error::InvalidState(format!("cannot start {next} while {current}")));
        }
        lifecycle.state = next;
        Ok(current)
    }

    async fn set_state(&self, state: WorkerState) {
        self.lifecycle.lock().await.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ResponseType;
    use crate::testing::{FaultyStorage, ORIGIN, ScriptedNetwork, local};
    use portal_cache_core::{CacheDb, MemoryCacheStorage, RequestIdentity};
    use reqwest::Method;
    use std::sync::atomic::Ordering;

    const V1: &str = "portal-cache-v1";

    async fn active_proxy<S: CacheStorage>(
        network: Arc<ScriptedNetwork>, storage: Arc<S>,
    ) -> OfflineCacheProxy<ScriptedNetwork, S> {
        network.ok("/", "<html>shell</html>");
        let proxy = OfflineCacheProxy::new(network, storage, ProxyConfig::new(V1, vec![local("/")]));
        proxy.install().await.unwrap();
        proxy.activate().await.unwrap();
        proxy
    }

    #[test]
    fn test_config_dedupes_manifest() {
        let config = ProxyConfig::new(V1, vec![local("/"), local("/index.html"), local("/")]);
        assert_eq!(config.manifest, vec![local("/"), local("/index.html")]);
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            precache_manifest: vec!["/".into(), "index.html".into(), "/manifest.json#x".into()],
            identity_headers: vec!["accept".into()],
            ..Default::default()
        };
        let config = ProxyConfig::from_app_config(&app).unwrap();
        assert_eq!(config.version_tag, "portal-cache-v1");
        assert_eq!(config.manifest, vec![local("/"), local("/index.html"), local("/manifest.json")]);
        assert_eq!(config.excluded_schemes, vec!["chrome-extension"]);
        assert_eq!(config.identity_headers, vec!["accept"]);
    }

    #[tokio::test]
    async fn test_online_fetch_is_cached_then_served_offline() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;
        network.ok("/index.html", "<html>portal</html>");

        let online = proxy.fetch(&ProxyRequest::get(local("/index.html"))).await.unwrap();
        assert_eq!(online.source, ResponseSource::Network);
        assert!(online.cached);
        assert!(
            storage
                .match_entry(V1, &RequestIdentity::get(local("/index.html").as_str()))
                .await
                .unwrap()
                .is_some()
        );

        network.set_offline(true);
        let offline = proxy.fetch(&ProxyRequest::get(local("/index.html"))).await.unwrap();
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response.body, online.response.body);
        assert_eq!(offline.response.status, 200);
    }

    #[tokio::test]
    async fn test_network_preferred_over_cache() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage).await;

        network.ok("/", "<html>shell v2</html>");
        let outcome = proxy.fetch(&ProxyRequest::get(local("/"))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
        assert_eq!(&outcome.response.body[..], b"<html>shell v2</html>");
    }

    #[tokio::test]
    async fn test_cached_snapshot_returned_byte_for_byte() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage).await;

        let body: Vec<u8> = (0..=255u8).collect();
        let mut response = ProxyResponse::basic(local("/report.xlsx"), 200, body.clone());
        response.headers.insert(
            "content-type",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".parse().unwrap(),
        );
        network.respond(response);
        proxy.fetch(&ProxyRequest::get(local("/report.xlsx"))).await.unwrap();

        network.set_offline(true);
        let outcome = proxy.fetch(&ProxyRequest::get(local("/report.xlsx"))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body.to_vec(), body);
        assert_eq!(
            outcome.response.headers.get("content-type").unwrap(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }

    #[tokio::test]
    async fn test_non_ascii_header_served_offline() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let proxy = active_proxy(network.clone(), storage).await;

        let disposition = reqwest::header::HeaderValue::from_bytes(b"attachment; filename=\"Relat\xf3rio.xlsx\"").unwrap();
        let mut response = ProxyResponse::basic(local("/download/relatorio"), 200, "xlsx");
        response.headers.insert("content-disposition", disposition.clone());
        network.respond(response);
        let online = proxy.fetch(&ProxyRequest::get(local("/download/relatorio"))).await.unwrap();
        assert!(online.cached);

        network.set_offline(true);
        let outcome = proxy.fetch(&ProxyRequest::get(local("/download/relatorio"))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.headers.get("content-disposition"), Some(&disposition));
    }

    #[tokio::test]
    async fn test_miss_while_offline_propagates_network_error() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage).await;

        network.set_offline(true);
        let result = proxy.fetch(&ProxyRequest::get(local("/never-seen.pdf"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_error_status_not_cached() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;

        for status in [404u16, 500, 206] {
            let path = format!("/status/{status}");
            network.respond(ProxyResponse::basic(local(&path), status, "nope"));
            let outcome = proxy.fetch(&ProxyRequest::get(local(&path))).await.unwrap();
            assert_eq!(outcome.response.status, status);
            assert!(!outcome.cached);
            assert!(
                storage
                    .match_entry(V1, &RequestIdentity::get(local(&path).as_str()))
                    .await
                    .unwrap()
                    .is_none()
            );
        }
    }

    #[tokio::test]
    async fn test_opaque_cross_origin_not_cached() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;
        let before = storage.entry_count(V1).await.unwrap();

        let url = Url::parse("https://app.powerbi.com/view?r=eyJrIjoi").unwrap();
        network.respond(ProxyResponse::opaque(url.clone()));

        let outcome = proxy.fetch(&ProxyRequest::get(url.clone())).await.unwrap();
        assert_eq!(outcome.response.status, 0);
        assert_eq!(outcome.response.response_type, ResponseType::Opaque);
        assert!(!outcome.cached);
        assert!(storage.match_entry(V1, &RequestIdentity::get(url.as_str())).await.unwrap().is_none());
        assert_eq!(storage.entry_count(V1).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_post_never_cached() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;
        network.ok("/upload", "stored");

        let request = ProxyRequest::new(Method::POST, local("/upload")).with_body("spreadsheet");
        let outcome = proxy.fetch(&request).await.unwrap();
        assert!(!outcome.cached);
        assert_eq!(storage.entry_count(V1).await.unwrap(), 1);

        network.set_offline(true);
        assert!(proxy.fetch(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_extension_scheme_never_cached() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;

        let url = Url::parse("chrome-extension://abcdef/inject.js").unwrap();
        network.respond(ProxyResponse::basic(url.clone(), 200, "ext"));

        let outcome = proxy.fetch(&ProxyRequest::get(url)).await.unwrap();
        assert!(!outcome.cached);
        assert_eq!(storage.entry_count(V1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repeated_fetch_keeps_one_entry() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;
        network.ok("/dados.csv", "a,b\n1,2\n");

        proxy.fetch(&ProxyRequest::get(local("/dados.csv"))).await.unwrap();
        let before = storage.entry_count(V1).await.unwrap();
        network.ok("/dados.csv", "a,b\n3,4\n");
        proxy.fetch(&ProxyRequest::get(local("/dados.csv"))).await.unwrap();

        assert_eq!(storage.entry_count(V1).await.unwrap(), before);
        let stored = storage
            .match_entry(V1, &RequestIdentity::get(local("/dados.csv").as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body, b"a,b\n3,4\n");
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_swallowed() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(FaultyStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;
        storage.fail_put.store(true, Ordering::SeqCst);
        network.ok("/index.html", "<html>portal</html>");

        let outcome = proxy.fetch(&ProxyRequest::get(local("/index.html"))).await.unwrap();
        assert_eq!(outcome.response.status, 200);
        assert_eq!(&outcome.response.body[..], b"<html>portal</html>");
        assert!(!outcome.cached);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates_network_error() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(FaultyStorage::new());
        let proxy = active_proxy(network.clone(), storage.clone()).await;
        storage.fail_match.store(true, Ordering::SeqCst);
        network.set_offline(true);

        let result = proxy.fetch(&ProxyRequest::get(local("/"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_identity_headers_separate_entries() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        network.ok("/", "<html>shell</html>");
        let config =
            ProxyConfig { identity_headers: vec!["accept".to_string()], ..ProxyConfig::new(V1, vec![local("/")]) };
        let proxy = OfflineCacheProxy::new(network.clone(), storage.clone(), config);
        proxy.install().await.unwrap();
        proxy.activate().await.unwrap();

        network.ok("/api/files", "[]");
        let json = ProxyRequest::get(local("/api/files"))
            .with_header("accept", "application/json")
            .unwrap();
        proxy.fetch(&json).await.unwrap();

        network.set_offline(true);
        let html = ProxyRequest::get(local("/api/files")).with_header("accept", "text/html").unwrap();
        assert!(proxy.fetch(&html).await.is_err());
        assert_eq!(proxy.fetch(&json).await.unwrap().source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_uncontrolled_fetch_bypasses_cache() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = OfflineCacheProxy::new(network.clone(), storage.clone(), ProxyConfig::new(V1, vec![local("/")]));
        network.ok("/index.html", "<html>portal</html>");

        let outcome = proxy.fetch(&ProxyRequest::get(local("/index.html"))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
        assert!(!outcome.cached);
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_storage() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let proxy = Arc::new(active_proxy(network.clone(), storage.clone()).await);
        for i in 0..8 {
            network.ok(&format!("/file/{i}.pdf"), &format!("pdf {i}"));
        }

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let proxy = proxy.clone();
            tasks.spawn(async move { proxy.fetch(&ProxyRequest::get(local(&format!("/file/{i}.pdf")))).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().unwrap().cached);
        }

        assert_eq!(storage.entry_count(V1).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_sqlite_scenario_offline_after_online() {
        let network = Arc::new(ScriptedNetwork::new());
        let storage = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let proxy = active_proxy(network.clone(), storage.clone()).await;
        network.ok("/index.html", "<html>portal</html>");

        proxy.fetch(&ProxyRequest::get(local("/index.html"))).await.unwrap();
        network.set_offline(true);

        let outcome = proxy.fetch(&ProxyRequest::get(local("/index.html"))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(&outcome.response.body[..], b"<html>portal</html>");
        assert_eq!(outcome.response.url.as_str(), format!("{ORIGIN}/index.html"));
    }
}
