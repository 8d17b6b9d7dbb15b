//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute a content-addressed cache key for a request identity.
///
/// `vary_headers` is the pre-rendered, order-stable header block that takes
/// part in the identity; an empty string when no headers do.
pub fn compute_request_key(method: &str, url: &str, vary_headers: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(vary_headers.as_bytes());
    hex::encode(hasher.finalize())
}
