//! Request identity: the key a cache entry is addressed by.

use serde::{Deserialize, Serialize};

use super::hash::compute_request_key;

/// Canonical identity of a request: method, URL and the headers that take
/// part in matching.
///
/// Header names are lowercased and kept sorted so two identities built from
/// the same headers in a different order produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: String,
    pub url: String,
    pub vary: Vec<(String, String)>,
}

impl RequestIdentity {
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self { method: method.as_ref().to_ascii_uppercase(), url: url.into(), vary: Vec::new() }
    }

    /// Identity of a plain GET for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Add a header to the identity, replacing any previous value for it.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        match self.vary.binary_search_by(|(n, _)| n.as_str().cmp(&name)) {
            Ok(idx) => self.vary[idx].1 = value,
            Err(idx) => self.vary.insert(idx, (name, value)),
        }
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Header block rendered as `name:value` lines.
    pub fn vary_block(&self) -> String {
        self.vary
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// SHA-256 hex key used for storage.
    pub fn cache_key(&self) -> String {
        compute_request_key(&self.method, &self.url, &self.vary_block())
    }
}

impl std::fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
