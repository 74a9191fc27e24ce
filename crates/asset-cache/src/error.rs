use std::path::PathBuf;

use reqwest::StatusCode;

use crate::worker::LifecycleState;

/// Errors raised while talking to the network.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned status code {status}")]
    Status { url: String, status: StatusCode },

    #[error("Network unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Errors raised by a cache storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Entry metadata could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The backend rejected the operation.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Errors raised while building a [`ResourceManifest`](crate::ResourceManifest).
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {reason}")]
    Parse { reason: String },

    #[error("core shell key `{key}` is not listed in the manifest resources")]
    CoreKeyMissing { key: String },
}

/// Top-level error returned by the worker's event handlers.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// The manifest persisted by a previous activation is unreadable.
    #[error("persisted manifest is corrupt: {reason}")]
    ManifestCorrupt { reason: String },

    /// Activation failed and every cache namespace was reset.
    #[error("activation failed, cache state was reset: {0}")]
    Activation(#[source] Box<WorkerError>),

    #[error("invalid lifecycle state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },

    #[error("Unknown worker message: {0}")]
    UnknownMessage(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl WorkerError {
    /// Returns the underlying network error, looking through activation wrapping.
    pub fn as_network(&self) -> Option<&NetworkError> {
        match self {
            WorkerError::Network(e) => Some(e),
            WorkerError::Activation(inner) => inner.as_network(),
            _ => None,
        }
    }
}
