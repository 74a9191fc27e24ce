//! # Cache System
//!
//! Named cache storage for captured responses. The worker keeps three caches:
//! the live content cache, a staging cache that only lives between install and
//! activation, and a metadata cache holding the persisted manifest.

// Module declarations
pub mod providers;
mod types;
mod utils;

// Re-export primary types from our various modules
pub use types::{CacheEntry, CacheMetadata, CacheResult};
pub use utils::{capture_response, extract_cache_headers};

pub use providers::{
    CacheHandle, CacheStorage, FileCache, FileStorage, MemoryCache, MemoryStorage, copy_entries,
};
