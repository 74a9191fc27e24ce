//! # File Cache
//!
//! This module implements a file-based persistent cache provider.
//!
//! Each named cache is a directory under the storage root. An entry is a
//! `<hash>.meta` JSON record, named after the SHA-256 of its URL, holding the
//! URL, status, headers, metadata and the name of the body file it points to.
//! Every write gets a body file of its own, and renaming the record into place
//! commits it, so concurrent writers of one URL never share a file and the
//! last rename wins. A writer that loses such a race can leave its body file
//! unreferenced until the cache directory is deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::{NamedTempFile, TempPath};
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};
use url::Url;

use crate::cache::providers::{CacheHandle, CacheStorage};
use crate::cache::types::{CacheEntry, CacheMetadata, CacheResult};
use crate::error::StoreError;

const BODY_EXT: &str = "body";
const META_EXT: &str = "meta";
const TEMP_EXT: &str = "tmp";

/// Sidecar record describing one entry.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    metadata: CacheMetadata,
    /// File name of the body, relative to the cache directory
    body_file: String,
}

fn io_err(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Filename-safe digest of a URL
fn entry_stem(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str());
    hex::encode(hasher.finalize())
}

/// Directory name of a named cache. Anything outside `[A-Za-z0-9._-]` becomes `_`.
fn cache_dir_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.chars().all(|c| c == '.') {
        format!("_{sanitized}")
    } else {
        sanitized
    }
}

/// A named cache backed by one directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path(&self) -> &Path {
        &self.cache_dir
    }

    fn meta_path(&self, url: &Url) -> PathBuf {
        self.cache_dir.join(format!("{}.{META_EXT}", entry_stem(url)))
    }

    /// Body path named by a record. Rejects anything but a bare file name.
    fn body_path(&self, record: &EntryRecord) -> CacheResult<PathBuf> {
        let name = Path::new(&record.body_file);
        if name.file_name() != Some(name.as_os_str()) {
            return Err(StoreError::Serialization {
                reason: format!("invalid body file name {:?}", record.body_file),
            });
        }
        Ok(self.cache_dir.join(name))
    }

    /// Create a uniquely named file in the cache directory. It is deleted on
    /// drop unless kept or persisted.
    fn unique_file(&self, stem: &str, suffix: &str) -> CacheResult<TempPath> {
        tempfile::Builder::new()
            .prefix(&format!("{stem}."))
            .suffix(suffix)
            .tempfile_in(&self.cache_dir)
            .map(NamedTempFile::into_temp_path)
            .map_err(|e| io_err(&self.cache_dir, e))
    }

    async fn read_record(&self, meta_path: &Path) -> CacheResult<Option<EntryRecord>> {
        let bytes = match fs::read(meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(meta_path, e)),
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to parse cache entry metadata");
                Err(StoreError::Serialization {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn remove_body(&self, record: &EntryRecord) {
        let Ok(body_path) = self.body_path(record) else {
            return;
        };
        match fs::remove_file(&body_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?body_path, error = %e, "Failed to remove cache body file"),
        }
    }
}

#[async_trait]
impl CacheHandle for FileCache {
    async fn get(&self, url: &Url) -> CacheResult<Option<CacheEntry>> {
        let meta_path = self.meta_path(url);

        // A concurrent put may commit a new record and drop the body we were
        // about to read; the second pass picks up the new record.
        for _ in 0..2 {
            let Some(record) = self.read_record(&meta_path).await? else {
                return Ok(None);
            };

            let body_path = self.body_path(&record)?;
            match fs::read(&body_path).await {
                Ok(bytes) => {
                    return Ok(Some(CacheEntry {
                        status: record.status,
                        headers: record.headers,
                        body: Bytes::from(bytes),
                        metadata: record.metadata,
                    }));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = ?body_path, "Body replaced while reading, retrying");
                }
                Err(e) => return Err(io_err(&body_path, e)),
            }
        }

        warn!(path = ?meta_path, "Cache entry has metadata but no body");
        Ok(None)
    }

    async fn put(&self, url: Url, entry: CacheEntry) -> CacheResult<()> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| io_err(&self.cache_dir, e))?;

        let stem = entry_stem(&url);
        let meta_path = self.meta_path(&url);

        let body_tmp = self.unique_file(&stem, &format!(".{BODY_EXT}"))?;
        if let Err(e) = fs::write(&body_tmp, &entry.body).await {
            warn!(path = ?body_tmp, error = %e, "Failed to write cache body file");
            return Err(io_err(&body_tmp, e));
        }
        let body_file = body_tmp
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| StoreError::Backend("temporary body file has no name".to_string()))?;

        let record = EntryRecord {
            url: url.to_string(),
            status: entry.status,
            headers: entry.headers,
            metadata: entry.metadata,
            body_file,
        };
        let record_json = serde_json::to_vec(&record).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;

        let meta_tmp = self.unique_file(&stem, &format!(".{META_EXT}.{TEMP_EXT}"))?;
        if let Err(e) = fs::write(&meta_tmp, &record_json).await {
            warn!(path = ?meta_tmp, error = %e, "Failed to write cache metadata file");
            return Err(io_err(&meta_tmp, e));
        }

        // Whatever the record points at now is superseded once ours lands.
        let previous = self.read_record(&meta_path).await.ok().flatten();

        let body_path = body_tmp.keep().map_err(|e| io_err(&e.path, e.error))?;
        if let Err(e) = meta_tmp.persist(&meta_path) {
            warn!(to = ?meta_path, error = %e.error, "Failed to commit cache metadata file");
            let _ = fs::remove_file(&body_path).await;
            return Err(io_err(&meta_path, e.error));
        }

        if let Some(previous) = previous {
            self.remove_body(&previous).await;
        }

        debug!(url = %url, "Stored cache entry on disk");
        Ok(())
    }

    async fn remove(&self, url: &Url) -> CacheResult<bool> {
        let meta_path = self.meta_path(url);
        let record = self.read_record(&meta_path).await.ok().flatten();

        let existed = match fs::remove_file(&meta_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to remove cache metadata file");
                return Err(io_err(&meta_path, e));
            }
        };

        if let Some(record) = record {
            self.remove_body(&record).await;
        }

        Ok(existed)
    }

    async fn keys(&self) -> CacheResult<Vec<Url>> {
        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.cache_dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err(&self.cache_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(META_EXT) {
                continue;
            }
            let Some(record) = self.read_record(&path).await? else {
                continue;
            };
            let url = Url::parse(&record.url).map_err(|e| StoreError::Serialization {
                reason: format!("stored URL {}: {e}", record.url),
            })?;
            keys.push(url);
        }

        keys.sort();
        Ok(keys)
    }
}

/// Directory-backed storage of named caches. Survives process restarts.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.root.join(cache_dir_name(name))
    }
}

#[async_trait]
impl CacheStorage for FileStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>> {
        let dir = self.cache_dir(name);
        fs::create_dir_all(&dir).await.map_err(|e| io_err(&dir, e))?;
        Ok(Arc::new(FileCache::new(dir)))
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        let dir = self.cache_dir(name);
        fs::try_exists(&dir).await.map_err(|e| io_err(&dir, e))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let dir = self.cache_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(cache = name, path = ?dir, "Deleted file cache");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(path = ?dir, error = %e, "Failed to remove cache directory");
                Err(io_err(&dir, e))
            }
        }
    }
}
