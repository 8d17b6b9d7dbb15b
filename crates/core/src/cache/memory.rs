//! In-memory cache storage.
//!
//! Uses a Vec of generations behind a tokio RwLock so enumeration keeps
//! creation order. Nothing survives the process.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::entries::StoredResponse;
use super::generations::GenerationInfo;
use super::identity::RequestIdentity;
use super::storage::CacheStorage;
use crate::Error;

#[derive(Debug, Default)]
struct Generation {
    name: String,
    created_at: String,
    entries: HashMap<String, StoredResponse>,
}

/// Process-local `CacheStorage` implementation.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    generations: RwLock<Vec<Generation>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generation {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), created_at: chrono::Utc::now().to_rfc3339(), entries: HashMap::new() }
    }
}

fn find_or_create<'a>(generations: &'a mut Vec<Generation>, name: &str) -> &'a mut Generation {
    let idx = match generations.iter().position(|g| g.name == name) {
        Some(idx) => idx,
        None => {
            generations.push(Generation::new(name));
            generations.len() - 1
        }
    };
    &mut generations[idx]
}

#[async_trait::async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, generation: &str) -> Result<bool, Error> {
        let mut generations = self.generations.write().await;
        if generations.iter().any(|g| g.name == generation) {
            return Ok(false);
        }
        generations.push(Generation::new(generation));
        Ok(true)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        Ok(generations.iter().map(|g| g.name.clone()).collect())
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let mut generations = self.generations.write().await;
        let before = generations.len();
        generations.retain(|g| g.name != generation);
        Ok(generations.len() != before)
    }

    async fn match_entry(
        &self, generation: &str, identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .find(|g| g.name == generation)
            .and_then(|g| g.entries.get(&identity.cache_key()))
            .cloned())
    }

    async fn put(
        &self, generation: &str, identity: &RequestIdentity, response: &StoredResponse,
    ) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        find_or_create(&mut generations, generation)
            .entries
            .insert(identity.cache_key(), response.clone());
        Ok(())
    }

    async fn put_all(&self, generation: &str, entries: &[(RequestIdentity, StoredResponse)]) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        let target = find_or_create(&mut generations, generation);
        for (identity, response) in entries {
            target.entries.insert(identity.cache_key(), response.clone());
        }
        Ok(())
    }

    async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .find(|g| g.name == generation)
            .map(|g| g.entries.len() as u64)
            .unwrap_or(0))
    }

    async fn generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .map(|g| GenerationInfo {
                name: g.name.clone(),
                created_at: g.created_at.clone(),
                entries: g.entries.len() as u64,
            })
            .collect())
    }
}
