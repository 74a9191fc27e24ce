//! Offline download: fill the content cache with every manifest resource.

use std::collections::HashSet;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, instrument};

use crate::context::WorkerContext;
use crate::error::{NetworkError, WorkerError};
use crate::fetch::{FetchRequest, ensure_success};
use crate::manifest::ResourceKey;

/// Outcome of an offline download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys fetched and written in this run
    pub fetched: Vec<ResourceKey>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.fetched.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct OfflineSync {
    ctx: WorkerContext,
}

impl OfflineSync {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Fetch and store every manifest key missing from the content cache.
    ///
    /// Existing entries are never touched. Nothing is written unless every
    /// fetch in the gap succeeds, so running it again after a failure retries
    /// the whole gap.
    #[instrument(skip(self), level = "debug")]
    pub async fn download_all(&self) -> Result<SyncReport, WorkerError> {
        let origin = &self.ctx.config.origin;
        let content = self.ctx.open_content().await?;

        let present: HashSet<ResourceKey> = content
            .keys()
            .await?
            .iter()
            .filter_map(|url| origin.stored_key(url))
            .collect();

        let missing: Vec<ResourceKey> = self
            .ctx
            .manifest
            .keys()
            .filter(|key| !present.contains(*key))
            .cloned()
            .collect();

        if missing.is_empty() {
            debug!("Content cache already holds every resource");
            return Ok(SyncReport::default());
        }

        let requests = missing
            .iter()
            .map(|key| origin.resource_url(key).map(FetchRequest::get))
            .collect::<Result<Vec<_>, _>>()?;

        let fetcher = &self.ctx.fetcher;
        let responses: Vec<_> = stream::iter(requests)
            .map(|request| async move {
                let entry = ensure_success(&request.url, fetcher.fetch(&request).await?)?;
                debug!(url = %request.url, "Fetched resource for offline use");
                Ok::<_, NetworkError>((request.url, entry))
            })
            .buffer_unordered(self.ctx.config.sync_concurrency.max(1))
            .try_collect()
            .await?;

        for (url, entry) in responses {
            content.put(url, entry).await?;
        }

        info!(fetched = missing.len(), "Offline download complete");
        Ok(SyncReport { fetched: missing })
    }
}
