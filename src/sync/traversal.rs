//! Paginated walk over the remote history.
//!
//! A walk is anchored on its first response: `to` is fixed to one past the
//! newest play seen, so plays scrobbled while the walk is in progress cannot
//! shift the pages under it. They are picked up by the next run.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::error::TraversalError;
use crate::lastfm::{RateLimiter, RecentTracksRequest, RecentTracksSource};
use crate::scrobble_store::ScrobbleRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalState {
    pub owner_id: String,
    pub store_location: String,
    /// Next page to request, 0 before the first response.
    pub page: u32,
    pub total_pages: u32,
    pub total_tracks: u64,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TraversalState {
    pub fn new(owner_id: &str, store_location: &str, from: Option<i64>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            store_location: store_location.to_string(),
            page: 0,
            total_pages: 0,
            total_tracks: 0,
            from,
            to: None,
        }
    }

    pub fn is_initial(&self) -> bool {
        self.to.is_none()
    }

    pub fn is_complete(&self) -> bool {
        !self.is_initial() && (self.total_pages == 0 || self.page > self.total_pages)
    }
}

pub struct TraversalEngine {
    source: Arc<dyn RecentTracksSource>,
    limiter: Arc<RateLimiter>,
    page_size: u32,
}

impl TraversalEngine {
    pub fn new(
        source: Arc<dyn RecentTracksSource>,
        limiter: Arc<RateLimiter>,
        page_size: u32,
    ) -> Self {
        Self {
            source,
            limiter,
            page_size,
        }
    }

    /// Requests the page after `state` and returns the state that follows it
    /// together with the played items of that page.
    pub async fn advance(
        &self,
        state: &TraversalState,
    ) -> Result<(TraversalState, Vec<ScrobbleRecord>), TraversalError> {
        if state.is_complete() {
            return Err(TraversalError::AlreadyComplete);
        }

        let request = RecentTracksRequest {
            account_id: state.owner_id.clone(),
            from: state.from,
            to: state.to,
            page: (state.page != 0).then_some(state.page),
            limit: self.page_size,
        };

        self.limiter.await_slot().await;
        let response = self
            .source
            .recent_tracks(&request)
            .await
            .map_err(TraversalError::Remote)?;
        debug!(
            "got page {}/{} ({} tracks)",
            response.page,
            response.total_pages,
            response.tracks.len()
        );

        let items: Vec<ScrobbleRecord> = response
            .tracks
            .iter()
            .filter_map(|track| track.to_record())
            .collect();

        let to = match state.to {
            Some(to) => to,
            None => items.iter().map(|r| r.played_at).max().unwrap_or(0) + 1,
        };

        let next = TraversalState {
            owner_id: state.owner_id.clone(),
            store_location: state.store_location.clone(),
            page: response.page + 1,
            total_pages: response.total_pages,
            total_tracks: response.total_tracks,
            from: state.from,
            to: Some(to),
        };
        Ok((next, items))
    }
}
