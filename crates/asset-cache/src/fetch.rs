//! # Network fetch
//!
//! The [`Fetcher`] trait is the worker's only way to reach the network.
//! [`HttpFetcher`] implements it with `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, HeaderValue, PRAGMA};
use reqwest::{Client, Method, StatusCode};
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::debug;
use url::Url;

use crate::cache::{CacheEntry, capture_response};
use crate::config::FetcherConfig;
use crate::error::NetworkError;

/// How a fetch interacts with intermediate HTTP caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Normal HTTP caching rules apply
    #[default]
    Default,
    /// Force revalidation with the server, ignoring intermediate caches
    Bypass,
}

/// An outgoing or intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub cache_mode: CacheMode,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            cache_mode: CacheMode::Default,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }
}

/// Something that can perform network requests.
///
/// Implementations resolve with the captured response for any HTTP status and
/// fail only when no response was received.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<CacheEntry, NetworkError>;
}

/// Turn a non-2xx response into [`NetworkError::Status`].
pub(crate) fn ensure_success(url: &Url, entry: CacheEntry) -> Result<CacheEntry, NetworkError> {
    if entry.is_success() {
        return Ok(entry);
    }
    Err(NetworkError::Status {
        url: url.to_string(),
        status: StatusCode::from_u16(entry.status).unwrap_or(StatusCode::BAD_GATEWAY),
    })
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &FetcherConfig) -> Result<Client, NetworkError> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| NetworkError::Client(format!("TLS protocol versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| NetworkError::Client(format!("platform verifier: {e}")))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder.build().map_err(NetworkError::from)
}

/// [`Fetcher`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, NetworkError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<CacheEntry, NetworkError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        if request.cache_mode == CacheMode::Bypass {
            builder = builder
                .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
                .header(PRAGMA, HeaderValue::from_static("no-cache"));
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                NetworkError::Timeout {
                    url: request.url.to_string(),
                }
            } else {
                NetworkError::Http(e)
            }
        };

        let response = builder.send().await.map_err(classify)?;
        debug!(url = %request.url, status = %response.status(), "Fetched resource");
        capture_response(response).await.map_err(classify)
    }
}
