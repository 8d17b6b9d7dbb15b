//! Test doubles for the network and storage collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use portal_cache_core::{CacheStorage, Error, GenerationInfo, MemoryCacheStorage, RequestIdentity, StoredResponse};
use url::Url;

use crate::fetch::Network;
use crate::request::{ProxyRequest, ProxyResponse};

pub const ORIGIN: &str = "http://localhost:8080";

pub fn local(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Network whose responses are scripted per URL.
///
/// Unscripted URLs and every URL while `offline` is set fail with
/// `Error::Network`.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, ProxyResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for requests to its own URL.
    pub fn respond(&self, response: ProxyResponse) {
        self.routes.lock().unwrap().insert(response.url.to_string(), response);
    }

    pub fn ok(&self, path: &str, body: &str) {
        self.respond(ProxyResponse::basic(local(path), 200, body.to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }
        self.routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::Network(format!("{}: connection refused", request.url)))
    }
}

/// Memory storage with switchable failures.
#[derive(Default)]
pub struct FaultyStorage {
    pub inner: MemoryCacheStorage,
    pub fail_put: AtomicBool,
    pub fail_keys: AtomicBool,
    pub fail_match: AtomicBool,
    pub fail_delete_of: Mutex<Option<String>>,
}

impl FaultyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn injected(op: &str) -> Error {
        Error::Serialization(format!("injected {op} failure"))
    }
}

#[async_trait::async_trait]
impl CacheStorage for FaultyStorage {
    async fn open(&self, generation: &str) -> Result<bool, Error> {
        self.inner.open(generation).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(Self::injected("keys"));
        }
        self.inner.keys().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        if self.fail_delete_of.lock().unwrap().as_deref() == Some(generation) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(generation).await
    }

    async fn match_entry(
        &self, generation: &str, identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, Error> {
        if self.fail_match.load(Ordering::SeqCst) {
            return Err(Self::injected("match"));
        }
        self.inner.match_entry(generation, identity).await
    }

    async fn put(
        &self, generation: &str, identity: &RequestIdentity, response: &StoredResponse,
    ) -> Result<(), Error> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }
        self.inner.put(generation, identity, response).await
    }

    async fn put_all(&self, generation: &str, entries: &[(RequestIdentity, StoredResponse)]) -> Result<(), Error> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }
        self.inner.put_all(generation, entries).await
    }

    async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        self.inner.entry_count(generation).await
    }

    async fn generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.inner.generations().await
    }
}
