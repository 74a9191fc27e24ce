//! Test doubles for the worker's collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use url::Url;

use crate::cache::{CacheEntry, CacheHandle, CacheResult, CacheStorage, MemoryStorage};
use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::error::{NetworkError, StoreError};
use crate::fetch::{CacheMode, FetchRequest, Fetcher};
use crate::manifest::{ContentFingerprint, ResourceKey, ResourceManifest};
use crate::origin::Origin;

/// Origin used throughout the tests
pub const TEST_ORIGIN: &str = "https://app.example";

/// Macro to initialize tracing for tests
///
/// Usage:
/// - `init_test_tracing!()` - uses DEBUG level (default)
/// - `init_test_tracing!(INFO)` - uses specified level
#[macro_export]
macro_rules! init_test_tracing {
    () => {
        $crate::init_test_tracing!(DEBUG);
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}

/// Build a context on [`TEST_ORIGIN`] with default cache names.
pub fn test_context<R, K, F, C>(
    resources: R,
    core: C,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
) -> WorkerContext
where
    R: IntoIterator<Item = (K, F)>,
    K: Into<ResourceKey>,
    F: Into<ContentFingerprint>,
    C: IntoIterator,
    C::Item: Into<ResourceKey>,
{
    let origin = Origin::parse(TEST_ORIGIN).expect("test origin");
    let manifest = ResourceManifest::new(resources, core).expect("test manifest");
    WorkerContext::new(WorkerConfig::new(origin), manifest, storage, fetcher)
}

/// Canonical URL of `path` on [`TEST_ORIGIN`].
pub fn test_url(path: &str) -> Url {
    Url::parse(&format!("{TEST_ORIGIN}/{path}")).expect("test url")
}

/// Scripted [`Fetcher`] that serves registered bodies and records every call.
///
/// Unknown URLs answer `404`. A URL with a query or fragment falls back to the
/// body registered for the same URL without them.
#[derive(Debug, Default)]
pub struct MockFetcher {
    resources: Mutex<HashMap<String, CacheEntry>>,
    offline: AtomicBool,
    calls: Mutex<Vec<(Url, CacheMode)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.set_resource(url, body);
        self
    }

    /// Register or replace the body served for `url`
    pub fn set_resource(&self, url: &str, body: impl Into<Bytes>) {
        let url = Url::parse(url).expect("mock url");
        self.resources
            .lock()
            .insert(url.to_string(), CacheEntry::new(200, vec![], body));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every fetch issued so far, in order
    pub fn calls(&self) -> Vec<(Url, CacheMode)> {
        self.calls.lock().clone()
    }

    /// Number of fetches issued for exactly `url`
    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(called, _)| called.as_str() == url)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<CacheEntry, NetworkError> {
        self.calls
            .lock()
            .push((request.url.clone(), request.cache_mode));

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unavailable(request.url.to_string()));
        }

        let resources = self.resources.lock();
        if let Some(entry) = resources.get(request.url.as_str()) {
            return Ok(entry.clone());
        }
        let mut bare = request.url.clone();
        bare.set_query(None);
        bare.set_fragment(None);
        Ok(resources
            .get(bare.as_str())
            .cloned()
            .unwrap_or_else(|| CacheEntry::new(404, vec![], "not found")))
    }
}

/// [`MemoryStorage`] wrapper that fails chosen operations on chosen caches.
///
/// The failure mode is captured when a cache is opened.
#[derive(Debug, Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    fail_removals_in: Mutex<Option<String>>,
    fail_puts_in: Mutex<Option<String>>,
}

impl FaultyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_removals_in(&self, name: &str) {
        *self.fail_removals_in.lock() = Some(name.to_string());
    }

    pub fn fail_puts_in(&self, name: &str) {
        *self.fail_puts_in.lock() = Some(name.to_string());
    }
}

struct FaultyHandle {
    inner: Arc<dyn CacheHandle>,
    fail_remove: bool,
    fail_put: bool,
}

fn injected() -> StoreError {
    StoreError::Backend("injected failure".to_string())
}

#[async_trait]
impl CacheHandle for FaultyHandle {
    async fn get(&self, url: &Url) -> CacheResult<Option<CacheEntry>> {
        self.inner.get(url).await
    }

    async fn put(&self, url: Url, entry: CacheEntry) -> CacheResult<()> {
        if self.fail_put {
            return Err(injected());
        }
        self.inner.put(url, entry).await
    }

    async fn remove(&self, url: &Url) -> CacheResult<bool> {
        if self.fail_remove {
            return Err(injected());
        }
        self.inner.remove(url).await
    }

    async fn keys(&self) -> CacheResult<Vec<Url>> {
        self.inner.keys().await
    }
}

#[async_trait]
impl CacheStorage for FaultyStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>> {
        let inner = self.inner.open(name).await?;
        let fail_remove = self.fail_removals_in.lock().as_deref() == Some(name);
        let fail_put = self.fail_puts_in.lock().as_deref() == Some(name);
        Ok(Arc::new(FaultyHandle {
            inner,
            fail_remove,
            fail_put,
        }))
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        self.inner.delete(name).await
    }
}
