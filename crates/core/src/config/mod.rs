//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PORTAL_CACHE_*)
//! 2. TOML config file (if PORTAL_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PORTAL_CACHE_*)
/// 2. TOML config file (if PORTAL_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache generation.
    ///
    /// Bumping it forces a fresh precache and evicts every older generation
    /// on the next activation. Set via PORTAL_CACHE_VERSION_TAG.
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// Origin the page is served from; relative paths resolve against it and
    /// only responses from it are classified as basic.
    ///
    /// Set via PORTAL_CACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resource paths that must be cached before install succeeds.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// URL schemes whose responses are never cached (browser extension
    /// resources and the like).
    #[serde(default = "default_excluded_schemes")]
    pub excluded_schemes: Vec<String>,

    /// Request headers that take part in the request identity.
    #[serde(default)]
    pub identity_headers: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via PORTAL_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PORTAL_CACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via PORTAL_CACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PORTAL_CACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Run install and activate as soon as the server starts.
    #[serde(default = "default_true")]
    pub install_on_start: bool,
}

fn default_version_tag() -> String {
    "portal-cache-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_precache_manifest() -> Vec<String> {
    ["/", "/index.html", "/index.tsx", "/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excluded_schemes() -> Vec<String> {
    vec!["chrome-extension".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./portal-cache.sqlite")
}

fn default_user_agent() -> String {
    "portal-cache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version_tag: default_version_tag(),
            origin: default_origin(),
            precache_manifest: default_precache_manifest(),
            excluded_schemes: default_excluded_schemes(),
            identity_headers: Vec::new(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            install_on_start: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PORTAL_CACHE_`
    /// 2. TOML file from `PORTAL_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PORTAL_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PORTAL_CACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
