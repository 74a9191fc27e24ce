//! # Cache Utilities
//!
//! Common utility functions for cache operations.

use reqwest::Response;

use crate::cache::types::{CacheEntry, CacheMetadata};

/// Extract common cache-related headers from an HTTP response
pub fn extract_cache_headers(
    response: &Response,
) -> (Option<String>, Option<String>, Option<String>) {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    (header("ETag"), header("Last-Modified"), header("Content-Type"))
}

/// Capture a complete response, reading the whole body.
pub async fn capture_response(response: Response) -> Result<CacheEntry, reqwest::Error> {
    let (etag, last_modified, content_type) = extract_cache_headers(&response);
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = response.bytes().await?;
    let metadata = CacheMetadata::new(body.len() as u64)
        .with_etag_option(etag)
        .with_last_modified_option(last_modified)
        .with_content_type_option(content_type);

    Ok(CacheEntry {
        status,
        headers,
        body,
        metadata,
    })
}
