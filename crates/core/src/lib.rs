//! Core types and shared functionality for portal-cache.
//!
//! This crate provides:
//! - Versioned response cache storage (SQLite and in-memory backends)
//! - Request identity hashing
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStorage, GenerationInfo, MemoryCacheStorage, RequestIdentity, StoredResponse};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
