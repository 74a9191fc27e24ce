use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::builder::{FetcherConfigBuilder, WorkerConfigBuilder};
use crate::origin::Origin;

const DEFAULT_USER_AGENT: &str = concat!("asset-cache/", env!("CARGO_PKG_VERSION"));

/// Names of the three caches the worker manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    /// The live cache requests are served from
    pub content: String,

    /// Holds the core shell between install and activation
    pub staging: String,

    /// Holds the manifest persisted by the last activation
    pub manifest_meta: String,
}

impl Default for CacheNames {
    fn default() -> Self {
        Self {
            content: "app-cache".to_owned(),
            staging: "app-temp-cache".to_owned(),
            manifest_meta: "app-manifest".to_owned(),
        }
    }
}

/// Configuration of one worker version
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Origin the worker serves; keys are paths relative to it
    pub origin: Origin,

    pub cache_names: CacheNames,

    /// Record name of the persisted manifest inside the metadata cache
    pub manifest_record: String,

    /// Maximum number of concurrent fetches during an offline download
    pub sync_concurrency: usize,
}

impl WorkerConfig {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            cache_names: CacheNames::default(),
            manifest_record: "manifest".to_owned(),
            sync_concurrency: 8,
        }
    }

    pub fn builder(origin: Origin) -> WorkerConfigBuilder {
        WorkerConfigBuilder::new(origin)
    }
}

/// Configurable options for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: FetcherConfig::get_default_headers(),
        }
    }
}

impl FetcherConfig {
    pub fn builder() -> FetcherConfigBuilder {
        FetcherConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_names_are_distinct() {
        let names = CacheNames::default();
        assert_ne!(names.content, names.staging);
        assert_ne!(names.content, names.manifest_meta);
        assert_ne!(names.staging, names.manifest_meta);
    }

    #[test]
    fn worker_defaults() {
        let config = WorkerConfig::new(Origin::parse("https://app.example").unwrap());
        assert_eq!(config.manifest_record, "manifest");
        assert_eq!(config.sync_concurrency, 8);
        assert_eq!(config.cache_names.content, "app-cache");
    }

    #[test]
    fn fetcher_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("asset-cache/"));
        assert!(config.headers.contains_key(reqwest::header::ACCEPT));
    }
}
