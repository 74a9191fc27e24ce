use std::sync::Arc;

use crate::cache::{CacheHandle, CacheStorage};
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::fetch::Fetcher;
use crate::manifest::ResourceManifest;

/// Shared collaborators of one worker version.
///
/// Cheap to clone; every component holds its own copy.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<WorkerConfig>,
    pub manifest: Arc<ResourceManifest>,
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl WorkerContext {
    pub fn new(
        config: WorkerConfig,
        manifest: ResourceManifest,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            manifest: Arc::new(manifest),
            storage,
            fetcher,
        }
    }

    pub async fn open_content(&self) -> Result<Arc<dyn CacheHandle>, WorkerError> {
        Ok(self.storage.open(&self.config.cache_names.content).await?)
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("config", &self.config)
            .field("resources", &self.manifest.len())
            .finish_non_exhaustive()
    }
}
