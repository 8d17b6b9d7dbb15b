//! Install and activate events.

use futures_util::future::{join_all, try_join_all};
use portal_cache_core::{CacheStorage, Error, RequestIdentity, StoredResponse};
use serde::Serialize;
use url::Url;

use super::{OfflineCacheProxy, WorkerState};
use crate::fetch::Network;
use crate::request::ProxyRequest;

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    /// Manifest entries written.
    pub entries: usize,
    /// Whether the generation did not exist before this install.
    pub created: bool,
    /// Always set: a new version takes over without waiting for old pages to close.
    pub skip_waiting: bool,
}

/// Outcome of an activation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub current: String,
    /// Stale generations removed.
    pub deleted: Vec<String>,
    /// Stale generations whose removal failed; they stay until the next activation.
    pub failed: Vec<String>,
    /// Set when the generation list could not be read, so nothing was swept.
    pub sweep_skipped: bool,
}

impl<N: Network + ?Sized, S: CacheStorage + ?Sized> OfflineCacheProxy<N, S> {
    /// Precache the manifest into the current generation.
    ///
    /// All manifest resources are fetched concurrently and written in one
    /// batch. A single failure fails the install and leaves no partially
    /// populated new generation behind; the proxy returns to the state it
    /// started from. A successful re-install of an active proxy refreshes the
    /// generation in place and stays `Active`.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if an install or activation is already running.
    /// - `InstallFailed` naming the first resource that could not be stored.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let previous = self.begin(WorkerState::Installing, WorkerState::can_install).await?;
        let generation = self.config.version_tag.as_str();
        tracing::info!(generation, resources = self.config.manifest.len(), "install started");

        match self.precache(generation).await {
            Ok((created, entries)) => {
                let next = if previous == WorkerState::Active { WorkerState::Active } else { WorkerState::Installed };
                self.set_state(next).await;
                tracing::info!(generation, entries, created, "install complete");
                Ok(InstallReport { generation: generation.to_string(), entries, created, skip_waiting: true })
            }
            Err(err) => {
                self.set_state(previous).await;
                tracing::warn!(generation, error = %err, state = %previous, "install failed");
                Err(err)
            }
        }
    }

    async fn precache(&self, generation: &str) -> Result<(bool, usize), Error> {
        let created = self
            .storage
            .open(generation)
            .await
            .map_err(|e| install_failed(generation, &e))?;

        let result = self.populate(generation).await;
        if result.is_err()
            && created
            && let Err(e) = self.storage.delete(generation).await
        {
            tracing::warn!(generation, error = %e, "failed to discard partial generation");
        }
        result.map(|entries| (created, entries))
    }

    async fn populate(&self, generation: &str) -> Result<usize, Error> {
        let fetches = self.config.manifest.iter().map(|url| self.precache_one(url));
        let entries = try_join_all(fetches).await?;

        self.storage
            .put_all(generation, &entries)
            .await
            .map_err(|e| install_failed(generation, &e))?;
        Ok(entries.len())
    }

    async fn precache_one(&self, url: &Url) -> Result<(RequestIdentity, StoredResponse), Error> {
        let request = ProxyRequest::get(url.clone());
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| install_failed(url.as_str(), &e))?;

        if !response.is_ok() {
            return Err(Error::InstallFailed {
                resource: url.to_string(),
                reason: format!("status {}", response.status),
            });
        }

        tracing::debug!(url = %url, bytes = response.body.len(), "precached");
        Ok((request.identity(&self.config.identity_headers), response.to_stored()))
    }

    /// Delete every generation except the current one and take control.
    ///
    /// Deletions run concurrently and are best effort: a failed deletion is
    /// logged and reported in `failed`, and the activation still completes.
    /// When the generation list cannot be read the sweep is skipped and
    /// `sweep_skipped` is set.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless installed (or already active).
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.begin(WorkerState::Activating, WorkerState::can_activate).await?;
        let current = self.config.version_tag.clone();

        let (names, sweep_skipped) = match self.storage.keys().await {
            Ok(names) => (names, false),
            Err(e) => {
                tracing::warn!(generation = %current, error = %e, "failed to list generations, skipping sweep");
                (Vec::new(), true)
            }
        };

        let stale: Vec<String> = names.into_iter().filter(|name| *name != current).collect();
        let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    tracing::info!(generation = %name, "deleted stale generation");
                    deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to delete stale generation");
                    failed.push(name);
                }
            }
        }

        {
            let mut lifecycle = self.lifecycle.lock().await;
            lifecycle.state = WorkerState::Active;
            lifecycle.controlling = true;
        }
        tracing::info!(
            generation = %current,
            deleted = deleted.len(),
            failed = failed.len(),
            sweep_skipped,
            "activated"
        );

        Ok(ActivateReport { current, deleted, failed, sweep_skipped })
    }
}

fn install_failed(resource: &str, err: &Error) -> Error {
    Error::InstallFailed { resource: resource.to_string(), reason: err.to_string() }
}
