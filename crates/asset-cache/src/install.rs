//! Install step: stage the core shell.

use futures::future::try_join_all;
use tracing::{debug, info, instrument};

use crate::context::WorkerContext;
use crate::error::{NetworkError, WorkerError};
use crate::fetch::{CacheMode, FetchRequest, ensure_success};

/// Outcome of a successful install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Number of core shell entries written to the staging cache
    pub staged: usize,
}

/// Fetches every core shell resource, bypassing HTTP caches, into staging.
#[derive(Debug, Clone)]
pub struct Installer {
    ctx: WorkerContext,
}

impl Installer {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Stage the core shell.
    ///
    /// All fetches run concurrently and nothing is written unless every one of
    /// them returns a 2xx response.
    #[instrument(skip(self), level = "debug")]
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        let origin = &self.ctx.config.origin;
        let staging = self
            .ctx
            .storage
            .open(&self.ctx.config.cache_names.staging)
            .await?;

        let requests = self
            .ctx
            .manifest
            .core()
            .iter()
            .map(|key| {
                origin
                    .resource_url(key)
                    .map(|url| FetchRequest::get(url).with_cache_mode(CacheMode::Bypass))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let responses = try_join_all(requests.into_iter().map(|request| async move {
            let entry = ensure_success(&request.url, self.ctx.fetcher.fetch(&request).await?)?;
            debug!(url = %request.url, "Fetched core shell resource");
            Ok::<_, NetworkError>((request.url, entry))
        }))
        .await?;

        let staged = responses.len();
        for (url, entry) in responses {
            staging.put(url, entry).await?;
        }

        info!(staged, "Core shell staged");
        Ok(InstallReport { staged })
    }
}
