//! # Cache Types
//!
//! This module defines common types used across the caching system.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Metadata for a cached resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the resource was captured (seconds since the Unix epoch)
    pub cached_at: u64,
    /// ETag value if available
    pub etag: Option<String>,
    /// Last-Modified header value if available
    pub last_modified: Option<String>,
    /// Content type of the resource
    pub content_type: Option<String>,
    /// Size of the body in bytes
    pub size: u64,
}

impl CacheMetadata {
    /// Create new metadata for a resource
    pub fn new(size: u64) -> Self {
        Self {
            cached_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            etag: None,
            last_modified: None,
            content_type: None,
            size,
        }
    }

    /// Set the ETag value as an Option
    pub fn with_etag_option(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Set the Last-Modified value as an Option
    pub fn with_last_modified_option(mut self, last_modified: Option<String>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the content type as an Option
    pub fn with_content_type_option(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}

/// A captured response: status, headers and the whole body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let content_type = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.clone());
        Self {
            status,
            metadata: CacheMetadata::new(body.len() as u64).with_content_type_option(content_type),
            headers,
            body,
        }
    }

    /// A `200 OK` JSON document, used for bookkeeping records.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::new(
            200,
            vec![("content-type".to_string(), "application/json".to_string())],
            body,
        )
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Result of a cache operation
pub type CacheResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_picks_up_content_type() {
        let entry = CacheEntry::new(
            200,
            vec![("Content-Type".to_string(), "text/html".to_string())],
            "<html></html>",
        );
        assert_eq!(entry.metadata.content_type.as_deref(), Some("text/html"));
        assert_eq!(entry.metadata.size, 13);
        assert_eq!(entry.header("content-type"), Some("text/html"));
        assert!(entry.is_success());
    }

    #[test]
    fn non_2xx_is_not_success() {
        assert!(!CacheEntry::new(404, vec![], "").is_success());
        assert!(!CacheEntry::new(304, vec![], "").is_success());
    }

    #[test]
    fn json_record() {
        let entry = CacheEntry::json(r#"{"a":"1"}"#);
        assert_eq!(entry.status, 200);
        assert_eq!(
            entry.metadata.content_type.as_deref(),
            Some("application/json")
        );
    }
}
