//! # Activation-time cache reconciliation
//!
//! Moves the content cache from what the previous worker version expected to
//! what the current manifest expects:
//!
//! - without a persisted manifest the content cache is untrusted and rebuilt
//!   from the staged shell alone;
//! - with one, every cached entry whose fingerprint is unchanged survives and
//!   everything else is evicted;
//! - the staged shell is then promoted over the survivors, staging is dropped
//!   and the current manifest is persisted.
//!
//! Any failure wipes all three caches. A half-reconciled cache is worse than
//! an empty one that refills on the next load.

use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::{CacheEntry, CacheHandle, copy_entries};
use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::manifest::{PersistedManifest, ResourceKey};

/// Outcome of a successful activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// No manifest was persisted, the content cache was rebuilt from scratch
    pub first_install: bool,
    /// Keys kept because their fingerprint did not change
    pub reused: Vec<ResourceKey>,
    /// Stored URLs dropped as stale or unknown
    pub evicted: Vec<Url>,
    /// Staged shell entries copied into the content cache
    pub promoted: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    ctx: WorkerContext,
}

impl Reconciler {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Reconcile the caches. On error every namespace has been deleted and the
    /// cause is returned inside [`WorkerError::Activation`].
    pub async fn activate(&self) -> Result<ActivationReport, WorkerError> {
        match self.reconcile().await {
            Ok(report) => {
                info!(
                    first_install = report.first_install,
                    reused = report.reused.len(),
                    evicted = report.evicted.len(),
                    promoted = report.promoted,
                    "Cache reconciled"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Failed to upgrade cache, resetting all cache state");
                self.reset().await;
                Err(WorkerError::Activation(Box::new(e)))
            }
        }
    }

    async fn reconcile(&self) -> Result<ActivationReport, WorkerError> {
        let names = &self.ctx.config.cache_names;
        let storage = &self.ctx.storage;
        let manifest = &self.ctx.manifest;

        let mut content = storage.open(&names.content).await?;
        let staging = storage.open(&names.staging).await?;
        let meta = storage.open(&names.manifest_meta).await?;

        let record_url = self
            .ctx
            .config
            .origin
            .record_url(&self.ctx.config.manifest_record)?;

        let mut report = ActivationReport::default();

        match meta.get(&record_url).await? {
            None => {
                report.first_install = true;
                storage.delete(&names.content).await?;
                content = storage.open(&names.content).await?;
            }
            Some(record) => {
                let previous = PersistedManifest::from_slice(&record.body)?;
                self.prune(content.as_ref(), &previous, &mut report).await?;
            }
        }

        report.promoted = copy_entries(staging.as_ref(), content.as_ref()).await?;
        storage.delete(&names.staging).await?;

        let persisted = manifest.to_persisted_json()?;
        meta.put(record_url, CacheEntry::json(persisted)).await?;

        Ok(report)
    }

    /// Drop entries that are unknown to the current manifest or whose
    /// fingerprint changed since `previous`.
    async fn prune(
        &self,
        content: &dyn CacheHandle,
        previous: &PersistedManifest,
        report: &mut ActivationReport,
    ) -> Result<(), WorkerError> {
        let origin = &self.ctx.config.origin;
        let manifest = &self.ctx.manifest;

        for url in content.keys().await? {
            let key = origin.stored_key(&url);
            let unchanged = key.as_ref().is_some_and(|key| {
                manifest
                    .get(key)
                    .is_some_and(|current| previous.get(key) == Some(current))
            });

            match key {
                Some(key) if unchanged => {
                    debug!(key = %key, "Reusing unchanged cache entry");
                    report.reused.push(key);
                }
                _ => {
                    debug!(url = %url, "Evicting stale cache entry");
                    content.remove(&url).await?;
                    report.evicted.push(url);
                }
            }
        }
        Ok(())
    }

    /// Delete every namespace, logging but otherwise ignoring failures.
    async fn reset(&self) {
        let names = &self.ctx.config.cache_names;
        for name in [&names.content, &names.staging, &names.manifest_meta] {
            if let Err(e) = self.ctx.storage.delete(name).await {
                warn!(cache = %name, error = %e, "Failed to delete cache during reset");
            }
        }
    }
}
