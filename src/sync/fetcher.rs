//! One synchronization run: pages through the remote history, persists each
//! page and keeps the checkpoint in step with what was persisted.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use super::checkpoint::CheckpointStore;
use super::duplicates::{DuplicateDetector, DuplicateReport};
use super::error::{SyncError, TraversalError};
use super::retry_policy::RetryPolicy;
use super::traversal::{TraversalEngine, TraversalState};
use crate::scrobble_store::ScrobbleStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub threshold_secs: i64,
    /// How far before the run's lower bound to rescan, so a duplicate pair
    /// straddling two runs is still seen as adjacent.
    pub lookback_secs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Stop after this many remote requests; `None` for no ceiling.
    pub request_limit: Option<u32>,
    /// Flag duplicates among the fetched plays once the run completes.
    pub duplicate_check: Option<DuplicateCheck>,
}

/// Summary of a run. An incomplete run, with or without errors, needs
/// another run to catch up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchResult {
    pub new_item_count: usize,
    pub request_count: u32,
    pub complete: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<DuplicateReport>,
}

pub struct FetchOrchestrator {
    account_id: String,
    engine: TraversalEngine,
    store: Arc<dyn ScrobbleStore>,
    checkpoints: CheckpointStore,
    retry_policy: RetryPolicy,
}

impl FetchOrchestrator {
    pub fn new(
        account_id: &str,
        engine: TraversalEngine,
        store: Arc<dyn ScrobbleStore>,
        checkpoints: CheckpointStore,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            engine,
            store,
            checkpoints,
            retry_policy,
        }
    }

    pub async fn run(&self, options: &FetchOptions) -> Result<FetchResult, SyncError> {
        let span = info_span!("fetch_run", account = %self.account_id);
        self.run_inner(options).instrument(span).await
    }

    fn start_state(&self) -> Result<TraversalState, SyncError> {
        let location = self.store.location();

        if let Some(checkpoint) = self.checkpoints.load().map_err(SyncError::CheckpointRead)? {
            if checkpoint.store_location != location || checkpoint.owner_id != self.account_id {
                return Err(SyncError::CheckpointMismatch {
                    expected: format!("{}@{}", self.account_id, location),
                    found: format!("{}@{}", checkpoint.owner_id, checkpoint.store_location),
                });
            }
            info!(
                "Resuming from checkpoint at page {}/{}",
                checkpoint.page, checkpoint.total_pages
            );
            return Ok(checkpoint);
        }

        match self.store.latest_timestamp().map_err(SyncError::Store)? {
            Some(latest) => {
                info!("Incremental update from {}", latest + 1);
                Ok(TraversalState::new(
                    &self.account_id,
                    &location,
                    Some(latest + 1),
                ))
            }
            None => {
                info!("Initial download into empty store");
                Ok(TraversalState::new(&self.account_id, &location, None))
            }
        }
    }

    async fn run_inner(&self, options: &FetchOptions) -> Result<FetchResult, SyncError> {
        let mut state = self.start_state()?;
        let run_from = state.from;
        let mut result = FetchResult::default();
        let mut error_count = 0u32;

        loop {
            let advanced = self.engine.advance(&state).await;
            result.request_count += 1;

            let (next, items) = match advanced {
                Ok(advanced) => advanced,
                Err(TraversalError::Remote(err)) => {
                    error_count += 1;
                    warn!("Remote request failed ({} in a row): {:#}", error_count, err);
                    result.errors.push(format!("{:#}", err));
                    if !self.retry_policy.should_retry(error_count) {
                        warn!("Giving up after {} retries", self.retry_policy.max_retries);
                        result.errors.push(format!(
                            "giving up after {} retries",
                            self.retry_policy.max_retries
                        ));
                        break;
                    }
                    let delay = self.retry_policy.backoff(error_count);
                    info!("Retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(err @ TraversalError::AlreadyComplete) => return Err(err.into()),
            };
            error_count = 0;

            if let Err(err) = self.store.store_activity(&items) {
                error!("Failed to store {} items: {:#}", items.len(), err);
                result
                    .errors
                    .push(format!("failed to store {} items: {:#}", items.len(), err));
                break;
            }
            result.new_item_count += items.len();

            if next.is_complete() {
                result.complete = true;
                break;
            }
            self.checkpoints
                .save(&next)
                .map_err(SyncError::CheckpointWrite)?;
            state = next;

            if let Some(limit) = options.request_limit {
                if result.request_count >= limit {
                    info!("Request limit of {} reached, stopping", limit);
                    break;
                }
            }
        }

        if result.complete {
            self.finish(run_from, options, &mut result);
        }

        info!(
            "Fetch finished: {} new items, {} requests, complete={}, {} errors",
            result.new_item_count,
            result.request_count,
            result.complete,
            result.errors.len()
        );
        Ok(result)
    }

    fn finish(&self, run_from: Option<i64>, options: &FetchOptions, result: &mut FetchResult) {
        if let Err(err) = self.checkpoints.clear() {
            error!("Failed to remove checkpoint, remove it manually: {:#}", err);
            result
                .errors
                .push(format!("failed to remove checkpoint: {:#}", err));
        }

        if let Some(check) = &options.duplicate_check {
            let since = run_from.map_or(0, |from| from - check.lookback_secs);
            match DuplicateDetector::new(check.threshold_secs).flag(self.store.as_ref(), since) {
                Ok(report) => {
                    info!("Duplicate check: {}", report);
                    result.duplicates = Some(report);
                }
                Err(err) => {
                    warn!("Duplicate check failed: {:#}", err);
                    result
                        .errors
                        .push(format!("duplicate check failed: {:#}", err));
                }
            }
        }
    }
}
