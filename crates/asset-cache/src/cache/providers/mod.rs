//! # Cache Providers
//!
//! This module contains different cache storage implementations.

// Re-export providers for easier access
pub use self::file::{FileCache, FileStorage};
pub use self::memory::{MemoryCache, MemoryStorage};
pub use self::provider::{CacheHandle, CacheStorage, copy_entries};

// Provider interface
pub mod provider;

// Individual provider implementations
pub mod file;
pub mod memory;
