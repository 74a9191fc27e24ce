//! # Configuration builders
//!
//! Fluent builders for [`WorkerConfig`] and [`FetcherConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use asset_cache::{FetcherConfig, Origin, WorkerConfig};
//!
//! let origin = Origin::parse("https://app.example").unwrap();
//! let config = WorkerConfig::builder(origin)
//!     .with_content_cache("my-app-cache")
//!     .with_sync_concurrency(4)
//!     .build();
//! assert_eq!(config.cache_names.content, "my-app-cache");
//!
//! let fetcher = FetcherConfig::builder()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Client", "offline")
//!     .build();
//! assert_eq!(fetcher.user_agent, "MyApp/1.0");
//! ```

use std::time::Duration;

use reqwest::header::HeaderValue;

use crate::config::{FetcherConfig, WorkerConfig};
use crate::origin::Origin;

/// Builder for [`WorkerConfig`]
#[derive(Debug, Clone)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn new(origin: Origin) -> Self {
        Self {
            config: WorkerConfig::new(origin),
        }
    }

    /// Set the name of the live content cache
    pub fn with_content_cache(mut self, name: impl Into<String>) -> Self {
        self.config.cache_names.content = name.into();
        self
    }

    /// Set the name of the install-time staging cache
    pub fn with_staging_cache(mut self, name: impl Into<String>) -> Self {
        self.config.cache_names.staging = name.into();
        self
    }

    /// Set the name of the cache holding the persisted manifest
    pub fn with_manifest_cache(mut self, name: impl Into<String>) -> Self {
        self.config.cache_names.manifest_meta = name.into();
        self
    }

    /// Set the record name of the persisted manifest
    pub fn with_manifest_record(mut self, name: impl Into<String>) -> Self {
        self.config.manifest_record = name.into();
        self
    }

    /// Set the offline download concurrency. Zero is treated as one.
    pub fn with_sync_concurrency(mut self, concurrency: usize) -> Self {
        self.config.sync_concurrency = concurrency.max(1);
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

/// Builder for [`FetcherConfig`]
#[derive(Debug, Clone, Default)]
pub struct FetcherConfigBuilder {
    config: FetcherConfig,
}

impl FetcherConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    pub fn build(self) -> FetcherConfig {
        self.config
    }
}
