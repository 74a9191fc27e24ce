//! # Request routing
//!
//! Every intercepted request is classified against the manifest:
//!
//! - non-GET, foreign-origin and unknown requests are left to the network;
//! - the entry document (`/`) is served online-first so a fresh deploy is
//!   picked up as soon as the network allows;
//! - every other manifest resource is served cache-first and written back to
//!   the content cache on a miss.

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheEntry, CacheHandle};
use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::fetch::FetchRequest;
use crate::manifest::ResourceKey;

/// How a request will be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Not handled by the worker
    PassThrough,
    /// Network first, cached copy as fallback
    OnlineFirst(ResourceKey),
    /// Cached copy first, network on a miss
    CacheFirst(ResourceKey),
}

/// Result of handling an intercepted request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The host should perform the request itself
    PassThrough,
    /// Respond with this entry
    Respond(CacheEntry),
}

#[derive(Debug, Clone)]
pub struct RequestRouter {
    ctx: WorkerContext,
}

impl RequestRouter {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    pub fn classify(&self, request: &FetchRequest) -> Route {
        if request.method != Method::GET {
            return Route::PassThrough;
        }

        let Some(key) = self.ctx.config.origin.request_key(&request.url) else {
            return Route::PassThrough;
        };

        if !self.ctx.manifest.contains(&key) {
            return Route::PassThrough;
        }

        if key.is_root() {
            Route::OnlineFirst(key)
        } else {
            Route::CacheFirst(key)
        }
    }

    pub async fn handle(&self, request: &FetchRequest) -> Result<FetchOutcome, WorkerError> {
        let route = self.classify(request);
        debug!(url = %request.url, route = ?route, "Routing request");

        let entry = match route {
            Route::PassThrough => return Ok(FetchOutcome::PassThrough),
            Route::OnlineFirst(key) => self.online_first(request, &key).await?,
            Route::CacheFirst(key) => self.cache_first(request, &key).await?,
        };
        Ok(FetchOutcome::Respond(entry))
    }

    async fn online_first(
        &self,
        request: &FetchRequest,
        key: &ResourceKey,
    ) -> Result<CacheEntry, WorkerError> {
        let canonical = self.ctx.config.origin.resource_url(key)?;

        let network_error = match self.ctx.fetcher.fetch(request).await {
            Ok(entry) => {
                if let Ok(content) = self.open_content_logged().await {
                    self.store(content.as_ref(), canonical, &entry).await;
                }
                return Ok(entry);
            }
            Err(e) => e,
        };

        debug!(key = %key, error = %network_error, "Network failed, falling back to cache");
        let cached = match self.open_content_logged().await {
            Ok(content) => content.get(&canonical).await.unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Failed to read cached fallback");
                None
            }),
            Err(_) => None,
        };

        cached.ok_or_else(|| network_error.into())
    }

    async fn cache_first(
        &self,
        request: &FetchRequest,
        key: &ResourceKey,
    ) -> Result<CacheEntry, WorkerError> {
        let canonical = self.ctx.config.origin.resource_url(key)?;
        let content = self.ctx.open_content().await?;

        if let Some(entry) = content.get(&canonical).await? {
            debug!(key = %key, "Cache hit");
            return Ok(entry);
        }

        debug!(key = %key, "Cache miss, fetching");
        let entry = self.ctx.fetcher.fetch(request).await?;
        self.store(content.as_ref(), canonical, &entry).await;
        Ok(entry)
    }

    /// Write a successful response back to the content cache. Failures are
    /// logged only; the response is still served.
    async fn store(&self, content: &dyn CacheHandle, url: Url, entry: &CacheEntry) {
        if !entry.is_success() {
            debug!(url = %url, status = entry.status, "Not caching unsuccessful response");
            return;
        }
        if let Err(e) = content.put(url.clone(), entry.clone()).await {
            warn!(url = %url, error = %e, "Failed to cache response");
        }
    }

    async fn open_content_logged(&self) -> Result<Arc<dyn CacheHandle>, WorkerError> {
        self.ctx.open_content().await.inspect_err(|e| {
            warn!(error = %e, "Failed to open content cache");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStorage, FileStorage, MemoryStorage};
    use crate::error::NetworkError;
    use crate::test_utils::{FaultyStorage, MockFetcher, test_context, test_url};

    fn router(storage: Arc<dyn CacheStorage>, fetcher: Arc<MockFetcher>) -> RequestRouter {
        RequestRouter::new(test_context(
            [("/", "h0"), ("main.dart.js", "h1"), ("assets/logo.png", "h2")],
            Vec::<&str>::new(),
            storage,
            fetcher,
        ))
    }

    fn get(url: &str) -> FetchRequest {
        FetchRequest::get(Url::parse(url).unwrap())
    }

    fn body(outcome: FetchOutcome) -> bytes::Bytes {
        match outcome {
            FetchOutcome::Respond(entry) => entry.body,
            FetchOutcome::PassThrough => panic!("expected a response"),
        }
    }

    #[test]
    fn classification() {
        let r = router(Arc::new(MemoryStorage::new()), Arc::new(MockFetcher::new()));

        for url in [
            "https://app.example",
            "https://app.example/",
            "https://app.example/#/settings",
            "https://app.example/?v=42",
        ] {
            assert_eq!(
                r.classify(&get(url)),
                Route::OnlineFirst(ResourceKey::root()),
                "{url}"
            );
        }

        assert_eq!(
            r.classify(&get("https://app.example/main.dart.js?v=123")),
            Route::CacheFirst(ResourceKey::from("main.dart.js"))
        );
        assert_eq!(
            r.classify(&get("https://app.example/unknown.js")),
            Route::PassThrough
        );
        assert_eq!(
            r.classify(&get("https://cdn.example/main.dart.js")),
            Route::PassThrough
        );

        let post = FetchRequest::new(Method::POST, test_url("main.dart.js"));
        assert_eq!(r.classify(&post), Route::PassThrough);
    }

    #[tokio::test]
    async fn encoded_request_is_served_from_its_plain_key() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(MockFetcher::new());
        let r = RequestRouter::new(test_context(
            [("assets/my file.png", "h1")],
            Vec::<&str>::new(),
            storage.clone(),
            fetcher.clone(),
        ));
        let content = storage.open("app-cache").await.unwrap();
        content
            .put(test_url("assets/my file.png"), CacheEntry::new(200, vec![], "spaced"))
            .await
            .unwrap();

        let request = get("https://app.example/assets/my%20file.png?v=3");
        assert_eq!(
            r.classify(&request),
            Route::CacheFirst(ResourceKey::from("assets/my file.png"))
        );
        assert_eq!(body(r.handle(&request).await.unwrap()), "spaced");
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn cache_first_populates_lazily_then_serves_from_cache() {
        crate::init_test_tracing!();
        let storage = Arc::new(MemoryStorage::new());
        let fetcher =
            Arc::new(MockFetcher::new().with_resource("https://app.example/main.dart.js", "main"));
        let r = router(storage.clone(), fetcher.clone());

        let first = r
            .handle(&get("https://app.example/main.dart.js?v=1"))
            .await
            .unwrap();
        assert_eq!(body(first), "main");

        fetcher.set_resource("https://app.example/main.dart.js", "changed");
        let second = r
            .handle(&get("https://app.example/main.dart.js?v=2"))
            .await
            .unwrap();
        assert_eq!(body(second), "main");
        assert_eq!(fetcher.calls().len(), 1);

        let content = storage.open("app-cache").await.unwrap();
        assert_eq!(content.keys().await.unwrap(), vec![test_url("main.dart.js")]);
    }

    #[tokio::test]
    async fn cache_first_network_error_propagates() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_offline(true);
        let r = router(Arc::new(MemoryStorage::new()), fetcher);

        let err = r
            .handle(&get("https://app.example/main.dart.js"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_network(),
            Some(NetworkError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn unsuccessful_responses_are_returned_but_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let r = router(storage.clone(), Arc::new(MockFetcher::new()));

        let outcome = r
            .handle(&get("https://app.example/assets/logo.png"))
            .await
            .unwrap();
        match outcome {
            FetchOutcome::Respond(entry) => assert_eq!(entry.status, 404),
            FetchOutcome::PassThrough => panic!("expected a response"),
        }

        let content = storage.open("app-cache").await.unwrap();
        assert!(content.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn online_first_refreshes_cache_and_falls_back_when_offline() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(MockFetcher::new().with_resource("https://app.example/", "v1"));
        let r = router(storage.clone(), fetcher.clone());

        assert_eq!(body(r.handle(&get("https://app.example/#/home")).await.unwrap()), "v1");

        fetcher.set_resource("https://app.example/", "v2");
        assert_eq!(body(r.handle(&get("https://app.example/")).await.unwrap()), "v2");

        fetcher.set_offline(true);
        assert_eq!(body(r.handle(&get("https://app.example")).await.unwrap()), "v2");
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn online_first_miss_surfaces_network_error() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_offline(true);
        let r = router(Arc::new(MemoryStorage::new()), fetcher);

        let err = r.handle(&get("https://app.example/")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Network(NetworkError::Unavailable(_))));
    }

    #[tokio::test]
    async fn pass_through_never_touches_network_or_cache() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(MockFetcher::new());
        let r = router(storage.clone(), fetcher.clone());

        let outcome = r.handle(&get("https://app.example/api/data")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::PassThrough);
        assert!(fetcher.calls().is_empty());
        assert!(storage.names().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_on_file_storage_store_one_whole_entry() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()));
        let fetcher = Arc::new(
            MockFetcher::new().with_resource("https://app.example/assets/logo.png", "logo-bytes"),
        );
        let r = router(storage.clone(), fetcher.clone());

        let req_a = get("https://app.example/assets/logo.png?v=1");
        let req_b = get("https://app.example/assets/logo.png?v=2");
        let (a, b) = tokio::join!(r.handle(&req_a), r.handle(&req_b));
        assert_eq!(body(a.unwrap()), "logo-bytes");
        assert_eq!(body(b.unwrap()), "logo-bytes");

        let content = storage.open("app-cache").await.unwrap();
        assert_eq!(content.keys().await.unwrap(), vec![test_url("assets/logo.png")]);
        let stored = content.get(&test_url("assets/logo.png")).await.unwrap().unwrap();
        assert_eq!(stored.body, "logo-bytes");

        fetcher.reset_calls();
        assert_eq!(
            body(r.handle(&get("https://app.example/assets/logo.png")).await.unwrap()),
            "logo-bytes"
        );
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_cache_write_still_serves_response() {
        let storage = Arc::new(FaultyStorage::new(MemoryStorage::new()));
        storage.fail_puts_in("app-cache");
        let fetcher =
            Arc::new(MockFetcher::new().with_resource("https://app.example/main.dart.js", "main"));
        let r = router(storage, fetcher);

        let outcome = r
            .handle(&get("https://app.example/main.dart.js"))
            .await
            .unwrap();
        assert_eq!(body(outcome), "main");
    }
}
