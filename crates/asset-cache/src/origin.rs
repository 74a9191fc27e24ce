//! Mapping between absolute URLs and [`ResourceKey`]s.
//!
//! Every entry this crate writes is stored under the canonical URL of its key
//! (`origin + "/" + key`, or `origin + "/"` for the root alias), so versioned
//! query strings and route fragments never split one resource across several
//! cache slots.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::WorkerError;
use crate::manifest::ResourceKey;

/// Cache-busting query marker stripped from request keys.
const VERSION_QUERY: &str = "?v=";

/// The origin the worker is serving, e.g. `https://app.example`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    serialized: String,
}

impl Origin {
    /// Parses an origin from any URL on it. Path, query and fragment are ignored.
    pub fn parse(input: &str) -> Result<Self, WorkerError> {
        let url = Url::parse(input).map_err(|e| WorkerError::InvalidUrl(format!("{input}: {e}")))?;
        Self::from_url(&url)
    }

    pub fn from_url(url: &Url) -> Result<Self, WorkerError> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(WorkerError::InvalidUrl(format!(
                "{url} has an opaque origin"
            )));
        }
        Ok(Self {
            serialized: origin.ascii_serialization(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Canonical store URL of `key`.
    pub fn resource_url(&self, key: &ResourceKey) -> Result<Url, WorkerError> {
        let raw = if key.is_root() {
            format!("{}/", self.serialized)
        } else {
            format!("{}/{}", self.serialized, key.as_str().trim_start_matches('/'))
        };
        Url::parse(&raw).map_err(|e| WorkerError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// URL of a bookkeeping record such as the persisted manifest.
    pub fn record_url(&self, name: &str) -> Result<Url, WorkerError> {
        self.resource_url(&ResourceKey::new(name))
    }

    /// Recovers the key of a stored entry.
    ///
    /// Only the root alias rule applies, after percent-decoding. URLs on another
    /// origin recover no key.
    pub fn stored_key(&self, url: &Url) -> Option<ResourceKey> {
        let rest = self.relative(url.as_str())?;
        if rest.is_empty() {
            Some(ResourceKey::root())
        } else {
            Some(ResourceKey::new(decode(rest)))
        }
    }

    /// Derives the key of an intercepted request.
    ///
    /// The `?v=` suffix is stripped, and the origin itself, any `origin/#...`
    /// route and the empty path all resolve to the root alias.
    pub fn request_key(&self, url: &Url) -> Option<ResourceKey> {
        let full = url.as_str();
        let rest = self.relative(full)?;

        let rooted_fragment = full
            .strip_prefix(self.serialized.as_str())
            .is_some_and(|tail| tail.starts_with("/#"));

        let key = match rest.find(VERSION_QUERY) {
            Some(idx) => &rest[..idx],
            None => rest,
        };

        if rooted_fragment || key.is_empty() {
            return Some(ResourceKey::root());
        }
        Some(ResourceKey::new(decode(key)))
    }

    /// The part of `url` after `origin + "/"`, or `None` for foreign URLs.
    fn relative<'a>(&self, url: &'a str) -> Option<&'a str> {
        let tail = url.strip_prefix(self.serialized.as_str())?;
        if tail.is_empty() {
            return Some(tail);
        }
        tail.strip_prefix('/')
    }
}

/// Undo the percent-encoding `Url` applies to paths, so keys compare in the
/// form the manifest lists them.
fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}
