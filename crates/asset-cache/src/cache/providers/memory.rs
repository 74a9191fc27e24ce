//! # Memory Cache Provider
//!
//! In-process cache storage. Useful for tests and for hosts that keep the
//! cache alive only as long as the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use crate::cache::providers::{CacheHandle, CacheStorage};
use crate::cache::types::{CacheEntry, CacheResult};

/// A single in-memory named cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<Url, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheHandle for MemoryCache {
    async fn get(&self, url: &Url) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries.read().get(url).cloned())
    }

    async fn put(&self, url: Url, entry: CacheEntry) -> CacheResult<()> {
        self.entries.write().insert(url, entry);
        Ok(())
    }

    async fn remove(&self, url: &Url) -> CacheResult<bool> {
        Ok(self.entries.write().remove(url).is_some())
    }

    async fn keys(&self) -> CacheResult<Vec<Url>> {
        let mut keys: Vec<Url> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// In-memory storage of named caches.
///
/// Handles opened before a cache is deleted keep working but are detached:
/// the next `open` of the same name starts empty.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    caches: Arc<RwLock<HashMap<String, Arc<MemoryCache>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every live cache, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>> {
        let cache = self
            .caches
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(cache = name, "Created memory cache");
                Arc::new(MemoryCache::new())
            })
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.caches.read().contains_key(name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let removed = self.caches.write().remove(name).is_some();
        if removed {
            debug!(cache = name, "Deleted memory cache");
        }
        Ok(removed)
    }
}
