use std::sync::Arc;

use asset_cache::test_utils::{MockFetcher, TEST_ORIGIN};
use asset_cache::{
    CacheEntry, CacheStorage, FetchOutcome, FetchRequest, FileStorage, LifecycleState,
    MemoryStorage, MessageOutcome, Origin, ResourceKey, ResourceManifest, ServiceWorker,
    WorkerConfig, WorkerError, WorkerMessage,
};
use url::Url;

fn url(path: &str) -> Url {
    Url::parse(&format!("{TEST_ORIGIN}/{path}")).unwrap()
}

fn get(path: &str) -> FetchRequest {
    FetchRequest::get(url(path))
}

fn worker(
    manifest: &str,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<MockFetcher>,
) -> ServiceWorker {
    ServiceWorker::new(
        WorkerConfig::new(Origin::parse(TEST_ORIGIN).unwrap()),
        ResourceManifest::from_json(manifest).unwrap(),
        storage,
        fetcher,
    )
}

async fn served(sw: &ServiceWorker, path: &str) -> String {
    match sw.on_fetch(&get(path)).await.unwrap() {
        FetchOutcome::Respond(entry) => String::from_utf8(entry.body.to_vec()).unwrap(),
        FetchOutcome::PassThrough => panic!("{path} was not handled"),
    }
}

const V1: &str = r#"{
    "resources": {
        "/": "r1",
        "main.dart.js": "m1",
        "assets/a.png": "a1"
    },
    "core": ["main.dart.js", "/"]
}"#;

const V2: &str = r#"{
    "resources": {
        "/": "r2",
        "main.dart.js": "m2",
        "assets/a.png": "a1",
        "assets/b.png": "b1"
    },
    "core": ["main.dart.js", "/"]
}"#;

#[tokio::test]
async fn upgrade_keeps_unchanged_assets_across_versions() {
    asset_cache::init_test_tracing!();
    let dir = tempfile::tempdir().unwrap();

    let fetcher = Arc::new(
        MockFetcher::new()
            .with_resource("https://app.example/", "index-v1")
            .with_resource("https://app.example/main.dart.js", "main-v1")
            .with_resource("https://app.example/assets/a.png", "a")
            .with_resource("https://app.example/assets/b.png", "b"),
    );

    let v1 = worker(V1, Arc::new(FileStorage::new(dir.path())), fetcher.clone());
    v1.on_install().await.unwrap();
    let report = v1.on_activate().await.unwrap();
    assert!(report.first_install);
    assert_eq!(report.promoted, 2);

    assert_eq!(served(&v1, "assets/a.png").await, "a");
    fetcher.reset_calls();
    assert_eq!(served(&v1, "main.dart.js?v=1").await, "main-v1");
    assert_eq!(served(&v1, "assets/a.png").await, "a");
    assert!(fetcher.calls().is_empty());

    fetcher.set_resource("https://app.example/", "index-v2");
    fetcher.set_resource("https://app.example/main.dart.js", "main-v2");

    let v2 = worker(V2, Arc::new(FileStorage::new(dir.path())), fetcher.clone());
    v2.on_install().await.unwrap();

    // The old version keeps serving its own shell until the new one activates.
    assert_eq!(served(&v1, "main.dart.js").await, "main-v1");

    fetcher.reset_calls();
    let report = v2.on_activate().await.unwrap();
    assert!(!report.first_install);
    assert_eq!(report.reused, vec![ResourceKey::from("assets/a.png")]);
    let mut evicted: Vec<String> = report.evicted.iter().map(Url::to_string).collect();
    evicted.sort();
    assert_eq!(
        evicted,
        vec!["https://app.example/", "https://app.example/main.dart.js"]
    );
    assert!(fetcher.calls().is_empty());

    assert_eq!(served(&v2, "main.dart.js?v=2").await, "main-v2");
    assert_eq!(served(&v2, "assets/a.png").await, "a");
    assert_eq!(fetcher.call_count("https://app.example/main.dart.js?v=2"), 0);
    assert_eq!(fetcher.call_count("https://app.example/assets/a.png"), 0);

    let outcome = v2
        .on_message("downloadOffline".parse::<WorkerMessage>().unwrap())
        .await
        .unwrap();
    match outcome {
        MessageOutcome::OfflineSync(report) => {
            assert_eq!(report.fetched, vec![ResourceKey::from("assets/b.png")]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let again = v2.on_message(WorkerMessage::DownloadOffline).await.unwrap();
    assert_eq!(again, MessageOutcome::OfflineSync(Default::default()));

    fetcher.set_offline(true);
    assert_eq!(served(&v2, "#/settings").await, "index-v2");
    assert_eq!(served(&v2, "assets/b.png").await, "b");
}

#[tokio::test]
async fn corrupt_state_is_reset_and_refilled() {
    let storage = Arc::new(MemoryStorage::new());
    let meta = storage.open("app-manifest").await.unwrap();
    meta.put(url("manifest"), CacheEntry::json("not json"))
        .await
        .unwrap();
    let content = storage.open("app-cache").await.unwrap();
    content
        .put(url("assets/a.png"), CacheEntry::new(200, vec![], "stale"))
        .await
        .unwrap();

    let fetcher = Arc::new(
        MockFetcher::new()
            .with_resource("https://app.example/", "index")
            .with_resource("https://app.example/main.dart.js", "main")
            .with_resource("https://app.example/assets/a.png", "a"),
    );
    let sw = worker(V1, storage.clone(), fetcher.clone());
    sw.on_install().await.unwrap();

    let err = sw.on_activate().await.unwrap_err();
    assert!(matches!(err, WorkerError::Activation(_)));
    assert_eq!(sw.state(), LifecycleState::Activated);
    assert!(storage.names().is_empty());

    fetcher.reset_calls();
    assert_eq!(served(&sw, "assets/a.png").await, "a");
    assert_eq!(served(&sw, "assets/a.png").await, "a");
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn unknown_requests_pass_through() {
    let fetcher = Arc::new(MockFetcher::new());
    let sw = worker(V1, Arc::new(MemoryStorage::new()), fetcher.clone());

    for request in [
        get("api/user"),
        FetchRequest::get(Url::parse("https://fonts.example/roboto.woff2").unwrap()),
        FetchRequest::new(reqwest::Method::POST, url("main.dart.js")),
    ] {
        assert_eq!(sw.on_fetch(&request).await.unwrap(), FetchOutcome::PassThrough);
    }
    assert!(fetcher.calls().is_empty());

    assert!(matches!(
        "refresh".parse::<WorkerMessage>(),
        Err(WorkerError::UnknownMessage(_))
    ));
}
