use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FetchSettings;
use crate::lastfm::{RateLimiter, RecentTracksSource};
use crate::scrobble_store::ScrobbleStore;
use crate::state_store::StateStore;
use crate::sync::{
    CheckpointStore, FetchOptions, FetchOrchestrator, FetchResult, RetryPolicy, SyncError,
    TraversalEngine,
};

/// Runs one fetch for an account. The scheduler only sees this seam.
#[async_trait]
pub trait FetchRunner: Send + Sync {
    async fn run_fetch(&self, account_id: &str) -> Result<FetchResult, SyncError>;
}

/// Builds a fresh [`FetchOrchestrator`] for every run from long-lived
/// collaborators.
pub struct OrchestratorRunner {
    source: Arc<dyn RecentTracksSource>,
    store: Arc<dyn ScrobbleStore>,
    state_store: Arc<dyn StateStore>,
    settings: FetchSettings,
    options: FetchOptions,
}

impl OrchestratorRunner {
    pub fn new(
        source: Arc<dyn RecentTracksSource>,
        store: Arc<dyn ScrobbleStore>,
        state_store: Arc<dyn StateStore>,
        settings: FetchSettings,
        options: FetchOptions,
    ) -> Self {
        Self {
            source,
            store,
            state_store,
            settings,
            options,
        }
    }

    pub fn orchestrator(&self, account_id: &str) -> FetchOrchestrator {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(
            self.settings.throttle_secs,
        )));
        FetchOrchestrator::new(
            account_id,
            TraversalEngine::new(self.source.clone(), limiter, self.settings.page_size),
            self.store.clone(),
            CheckpointStore::new(self.state_store.clone()),
            RetryPolicy::new(self.settings.max_retries),
        )
    }
}

#[async_trait]
impl FetchRunner for OrchestratorRunner {
    async fn run_fetch(&self, account_id: &str) -> Result<FetchResult, SyncError> {
        self.orchestrator(account_id).run(&self.options).await
    }
}
