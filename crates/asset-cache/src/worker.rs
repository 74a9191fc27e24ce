//! # Service worker
//!
//! [`ServiceWorker`] is the long-lived object for one worker version. It owns
//! the manifest and the injected store and fetcher, tracks the lifecycle
//! state, and exposes the event handlers the host calls.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::cache::CacheStorage;
use crate::config::{FetcherConfig, WorkerConfig};
use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::fetch::{FetchRequest, Fetcher, HttpFetcher};
use crate::install::{InstallReport, Installer};
use crate::manifest::ResourceManifest;
use crate::offline::{OfflineSync, SyncReport};
use crate::reconcile::{ActivationReport, Reconciler};
use crate::router::{FetchOutcome, RequestRouter};

/// Lifecycle of one worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this version will never control pages
    Redundant,
}

/// Commands posted to the worker by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    SkipWaiting,
    DownloadOffline,
}

impl WorkerMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerMessage::SkipWaiting => "skipWaiting",
            WorkerMessage::DownloadOffline => "downloadOffline",
        }
    }
}

impl FromStr for WorkerMessage {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skipWaiting" => Ok(WorkerMessage::SkipWaiting),
            "downloadOffline" => Ok(WorkerMessage::DownloadOffline),
            other => Err(WorkerError::UnknownMessage(other.to_string())),
        }
    }
}

impl fmt::Display for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handling a [`WorkerMessage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    SkipWaiting,
    OfflineSync(SyncReport),
}

pub struct ServiceWorker {
    ctx: WorkerContext,
    state: Mutex<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig,
        manifest: ResourceManifest,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            ctx: WorkerContext::new(config, manifest, storage, fetcher),
            state: Mutex::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    /// Create a worker that reaches the network through [`HttpFetcher`].
    pub fn with_http(
        config: WorkerConfig,
        manifest: ResourceManifest,
        storage: Arc<dyn CacheStorage>,
        fetcher_config: &FetcherConfig,
    ) -> Result<Self, WorkerError> {
        let fetcher = HttpFetcher::new(fetcher_config)?;
        Ok(Self::new(config, manifest, storage, Arc::new(fetcher)))
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Whether the worker asked the host to take over without waiting
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.ctx.config
    }

    pub fn manifest(&self) -> &ResourceManifest {
        &self.ctx.manifest
    }

    /// Stage the core shell. A failure leaves the worker `Redundant`.
    ///
    /// Eager takeover is requested as soon as installation starts.
    pub async fn on_install(&self) -> Result<InstallReport, WorkerError> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing)?;
        self.skip_waiting.store(true, Ordering::SeqCst);

        match Installer::new(self.ctx.clone()).install().await {
            Ok(report) => {
                self.set_state(LifecycleState::Installed);
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Install failed, worker is redundant");
                self.set_state(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    /// Reconcile the caches for this version.
    ///
    /// The worker is `Activated` afterwards even when reconciliation failed:
    /// the caches were reset and the worker serves from an empty cache.
    pub async fn on_activate(&self) -> Result<ActivationReport, WorkerError> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating)?;
        let result = Reconciler::new(self.ctx.clone()).activate().await;
        self.set_state(LifecycleState::Activated);
        result
    }

    pub async fn on_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, WorkerError> {
        RequestRouter::new(self.ctx.clone()).handle(request).await
    }

    pub async fn on_message(&self, message: WorkerMessage) -> Result<MessageOutcome, WorkerError> {
        match message {
            WorkerMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                Ok(MessageOutcome::SkipWaiting)
            }
            WorkerMessage::DownloadOffline => {
                let report = OfflineSync::new(self.ctx.clone()).download_all().await?;
                Ok(MessageOutcome::OfflineSync(report))
            }
        }
    }

    fn transition(&self, expected: LifecycleState, next: LifecycleState) -> Result<(), WorkerError> {
        let mut state = self.state.lock();
        if *state != expected {
            return Err(WorkerError::InvalidState {
                expected,
                actual: *state,
            });
        }
        let from = *state;
        info!(from = ?from, to = ?next, "Lifecycle transition");
        *state = next;
        Ok(())
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.lock();
        let from = *state;
        info!(from = ?from, to = ?next, "Lifecycle transition");
        *state = next;
    }
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("state", &self.state())
            .field("skip_waiting", &self.skip_waiting_requested())
            .field("ctx", &self.ctx)
            .finish()
    }
}
