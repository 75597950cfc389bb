//! Adaptive update loop.
//!
//! Wakes on a fixed tick and on refresh requests from live clients, decides
//! whether the account is due for a sync, runs it, and tells connected
//! viewers about new items. Accounts with live viewers are synced more often.

mod last_run;
mod runner;

pub use last_run::LastRunStore;
pub use runner::{FetchRunner, OrchestratorRunner};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerSettings;
use crate::live::{ClientRegistry, ServerMessage};
use crate::server::metrics;
use crate::sync::SyncError;

/// Capacity of the refresh request queue.
pub const UPDATE_REQUEST_CAPACITY: usize = 16;

/// A live client asking for its account to be synced now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    Tick,
    Requested(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The previous run is too recent.
    Cooldown,
    /// The account's interval has not elapsed yet.
    NotDue,
    Ran { new_items: usize, notified: usize },
    /// The run failed; the failure was logged.
    Failed,
}

pub struct UpdateScheduler {
    account_id: String,
    runner: Arc<dyn FetchRunner>,
    registry: Arc<ClientRegistry>,
    last_runs: LastRunStore,
    settings: SchedulerSettings,
    request_receiver: mpsc::Receiver<UpdateRequest>,
    shutdown_token: CancellationToken,
}

impl UpdateScheduler {
    pub fn new(
        account_id: &str,
        runner: Arc<dyn FetchRunner>,
        registry: Arc<ClientRegistry>,
        last_runs: LastRunStore,
        settings: SchedulerSettings,
        request_receiver: mpsc::Receiver<UpdateRequest>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            runner,
            registry,
            last_runs,
            settings,
            request_receiver,
            shutdown_token,
        }
    }

    /// Runs until the shutdown token is cancelled. Returns an error only for
    /// failures that need an operator, such as a checkpoint belonging to a
    /// different store.
    pub async fn run(&mut self) -> Result<(), SyncError> {
        info!(
            "Starting update scheduler for {}: tick={:?} active={:?} inactive={:?}",
            self.account_id,
            self.settings.tick,
            self.settings.active_interval,
            self.settings.inactive_interval
        );

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.settings.tick,
            self.settings.tick,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Update scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => Wake::Tick,
                Some(request) = self.request_receiver.recv() => Wake::Requested(request.account_id),
            };

            if let Err(err) = self.handle_wake(wake).await {
                error!("Update scheduler halted: {}", err);
                return Err(err);
            }
        }

        info!("Update scheduler stopped");
        Ok(())
    }

    pub async fn handle_wake(&self, wake: Wake) -> Result<WakeOutcome, SyncError> {
        let (account_id, source) = match wake {
            Wake::Tick => (self.account_id.clone(), "tick"),
            Wake::Requested(account_id) => (account_id, "client"),
        };
        let requested = source == "client";

        let last_run = self.last_runs.get(&account_id).unwrap_or_else(|err| {
            warn!("Couldn't load last run time for {}: {:#}", account_id, err);
            None
        });
        let elapsed = last_run.map(|at| (Utc::now() - at).to_std().unwrap_or(Duration::ZERO));

        if let Some(elapsed) = elapsed {
            if elapsed < self.settings.cooldown {
                if requested {
                    info!(
                        "Ignoring update request for {}, last run was only {:?} ago ({:?} minimum)",
                        account_id, elapsed, self.settings.cooldown
                    );
                }
                metrics::record_scheduler_wake(source, "cooldown");
                return Ok(WakeOutcome::Cooldown);
            }

            let viewers = self.registry.count_for_account(&account_id).await;
            let interval = if viewers > 0 {
                self.settings.active_interval
            } else {
                self.settings.inactive_interval
            };
            if elapsed < interval {
                debug!(
                    "{} not due: {:?} since last run, interval {:?} ({} viewers)",
                    account_id, elapsed, interval, viewers
                );
                metrics::record_scheduler_wake(source, "not_due");
                return Ok(WakeOutcome::NotDue);
            }
        }

        metrics::record_scheduler_wake(source, "run");
        let result = self.runner.run_fetch(&account_id).await;

        if let Err(err) = self.last_runs.set(&account_id, Utc::now()) {
            warn!("Couldn't save last run time for {}: {:#}", account_id, err);
        }

        match result {
            Ok(result) => {
                metrics::record_fetch_result(&result);
                let notified = if result.new_item_count > 0 {
                    let message = ServerMessage::update_available(result.new_item_count);
                    let delivery = self.registry.notify_account(&account_id, &message).await;
                    info!(
                        "Sent update to {} live clients of {} ({} dropped)",
                        delivery.delivered, account_id, delivery.dropped
                    );
                    metrics::record_notifications(delivery.delivered, delivery.dropped);
                    delivery.delivered
                } else {
                    0
                };
                Ok(WakeOutcome::Ran {
                    new_items: result.new_item_count,
                    notified,
                })
            }
            Err(err @ SyncError::CheckpointMismatch { .. }) => {
                metrics::record_fetch_error();
                Err(err)
            }
            Err(err) => {
                metrics::record_fetch_error();
                error!("Update for {} failed: {}", account_id, err);
                Ok(WakeOutcome::Failed)
            }
        }
    }
}
