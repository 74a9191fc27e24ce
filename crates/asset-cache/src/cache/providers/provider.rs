//! # Cache Provider
//!
//! This module defines the traits every cache storage backend must implement.
//!
//! A [`CacheStorage`] holds named caches. Opening a name returns a
//! [`CacheHandle`] that stores whole responses keyed by absolute URL. Each
//! method is a single atomic operation against the backend; concurrent writers
//! to the same key follow last-write-wins.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::cache::types::{CacheEntry, CacheResult};

/// A set of named caches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the named cache, creating it if it does not exist
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>>;

    /// Check whether the named cache exists
    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Delete the named cache and everything in it. Returns `false` if it did not exist
    async fn delete(&self, name: &str) -> CacheResult<bool>;
}

/// One named cache.
#[async_trait]
pub trait CacheHandle: Send + Sync {
    /// Get the entry stored under `url`
    async fn get(&self, url: &Url) -> CacheResult<Option<CacheEntry>>;

    /// Store an entry, replacing any previous one
    async fn put(&self, url: Url, entry: CacheEntry) -> CacheResult<()>;

    /// Remove an entry. Returns `false` if there was nothing to remove
    async fn remove(&self, url: &Url) -> CacheResult<bool>;

    /// URLs of every stored entry
    async fn keys(&self) -> CacheResult<Vec<Url>>;
}

/// Copy every entry of `from` into `to`, key for key. Returns the number copied.
pub async fn copy_entries(from: &dyn CacheHandle, to: &dyn CacheHandle) -> CacheResult<usize> {
    let mut copied = 0;
    for url in from.keys().await? {
        if let Some(entry) = from.get(&url).await? {
            to.put(url, entry).await?;
            copied += 1;
        }
    }
    Ok(copied)
}
