//! # asset-cache
//!
//! Offline asset caching for a single-page web application, modeled on the
//! service worker lifecycle.
//!
//! ## Features
//!
//! - Fingerprinted resource manifest with a core shell staged at install
//! - Activation-time reconciliation that keeps unchanged entries and evicts
//!   stale ones
//! - Online-first routing for the entry document, cache-first for everything
//!   else
//! - On-demand offline download of the full manifest
//! - In-memory and file-backed cache storage

pub mod builder;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod install;
pub mod manifest;
pub mod offline;
pub mod origin;
pub mod reconcile;
pub mod router;
pub mod test_utils;
pub mod worker;

pub use builder::{FetcherConfigBuilder, WorkerConfigBuilder};
pub use cache::{CacheEntry, CacheHandle, CacheStorage, FileStorage, MemoryStorage};
pub use config::{CacheNames, FetcherConfig, WorkerConfig};
pub use context::WorkerContext;
pub use error::{ManifestError, NetworkError, StoreError, WorkerError};
pub use fetch::{CacheMode, FetchRequest, Fetcher, HttpFetcher, create_client};
pub use install::{InstallReport, Installer};
pub use manifest::{ContentFingerprint, PersistedManifest, ResourceKey, ResourceManifest};
pub use offline::{OfflineSync, SyncReport};
pub use origin::Origin;
pub use reconcile::{ActivationReport, Reconciler};
pub use router::{FetchOutcome, RequestRouter, Route};
pub use worker::{LifecycleState, MessageOutcome, ServiceWorker, WorkerMessage};
