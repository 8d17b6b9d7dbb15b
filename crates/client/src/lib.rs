//! Client side of portal-cache.
//!
//! This crate provides the network collaborator, the request/response model
//! and the offline cache proxy that combines them with a `CacheStorage`.

pub mod classify;
pub mod fetch;
pub mod proxy;
pub mod request;

#[cfg(test)]
mod testing;

pub use classify::{IneligibleReason, ResponseClass, classify};
pub use fetch::{FetchClient, FetchConfig, Network, canonicalize};
pub use proxy::{
    ActivateReport, FetchOutcome, InstallReport, OfflineCacheProxy, ProxyConfig, ResponseSource, WorkerState,
};
pub use request::{ProxyRequest, ProxyResponse, ResponseType};
pub use reqwest::Method;
