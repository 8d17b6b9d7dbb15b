//! Versioned response cache for the offline proxy.
//!
//! Responses are grouped into named generations. Each generation maps a
//! request identity to a stored response snapshot. This module provides:
//!
//! - The `CacheStorage` collaborator trait used by the proxy
//! - A SQLite backend with async access via tokio-rusqlite
//! - An in-memory backend for tests and embedders
//! - Content-addressed request keys using SHA-256 hashing

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod identity;
pub mod memory;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredResponse;
pub use generations::GenerationInfo;
pub use identity::RequestIdentity;
pub use memory::MemoryCacheStorage;
pub use storage::CacheStorage;
