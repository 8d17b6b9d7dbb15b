//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version_tag` is empty or contains whitespace
    /// - `origin` is not an absolute http(s) URL
    /// - `precache_manifest` is empty or has an empty entry
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version_tag.is_empty() {
            return Err(ConfigError::Invalid { field: "version_tag".into(), reason: "must not be empty".into() });
        }
        if self.version_tag.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "version_tag".into(),
                reason: "must not contain whitespace".into(),
            });
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.host_str().is_some() => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported origin: {origin}"),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() });
            }
        }

        if self.precache_manifest.is_empty() {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: "must list at least one resource".into(),
            });
        }
        if self.precache_manifest.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: "entries must not be empty".into(),
            });
        }

        let mut seen = HashSet::new();
        for path in &self.precache_manifest {
            if !seen.insert(path.as_str()) {
                tracing::warn!(path = %path, "precache_manifest lists a resource more than once");
            }
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
