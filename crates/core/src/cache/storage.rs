//! Storage collaborator abstraction.
//!
//! The proxy never talks to SQLite directly. It is handed a `CacheStorage`
//! so tests and embedders can substitute another backend.

use super::connection::CacheDb;
use super::entries::StoredResponse;
use super::generations::GenerationInfo;
use super::identity::RequestIdentity;
use crate::Error;

/// Named-generation key-value store for response snapshots.
///
/// Concurrent writes to the same key are allowed and the last one wins.
/// There are no cross-key transactions except `put_all`.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if absent. Returns true when it was created.
    async fn open(&self, generation: &str) -> Result<bool, Error>;

    /// Generation names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation with all its entries. False if it did not exist.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;

    async fn match_entry(
        &self, generation: &str, identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, Error>;

    /// Store a snapshot, replacing any previous one for the same identity.
    async fn put(
        &self, generation: &str, identity: &RequestIdentity, response: &StoredResponse,
    ) -> Result<(), Error>;

    /// Store a batch atomically: all entries are written or none are.
    async fn put_all(&self, generation: &str, entries: &[(RequestIdentity, StoredResponse)]) -> Result<(), Error>;

    async fn entry_count(&self, generation: &str) -> Result<u64, Error>;

    /// Generations with their entry counts, in creation order.
    async fn generations(&self) -> Result<Vec<GenerationInfo>, Error>;

    async fn has(&self, generation: &str) -> Result<bool, Error> {
        Ok(self.keys().await?.iter().any(|name| name == generation))
    }
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, generation: &str) -> Result<bool, Error> {
        self.open_generation(generation).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.delete_generation(generation).await
    }

    async fn match_entry(
        &self, generation: &str, identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, Error> {
        CacheDb::match_entry(self, generation, identity).await
    }

    async fn put(
        &self, generation: &str, identity: &RequestIdentity, response: &StoredResponse,
    ) -> Result<(), Error> {
        self.put_entry(generation, identity, response).await
    }

    async fn put_all(&self, generation: &str, entries: &[(RequestIdentity, StoredResponse)]) -> Result<(), Error> {
        self.put_entries(generation, entries).await
    }

    async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        self.count_entries(generation).await
    }

    async fn generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.list_generations().await
    }
}
