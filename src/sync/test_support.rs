//! In-memory remote history used by the sync and scheduler tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::lastfm::{RecentTracksPage, RecentTracksRequest, RecentTracksSource, RemoteTrack};
use crate::scrobble_store::NamedRef;

pub fn remote_track(played_at: i64) -> RemoteTrack {
    RemoteTrack {
        external_id: None,
        title: format!("track-{}", played_at),
        url: None,
        artist: NamedRef::new("artist", None),
        album: NamedRef::new("album", None),
        images: vec![],
        played_at: Some(played_at),
        now_playing: false,
    }
}

pub fn now_playing_track() -> RemoteTrack {
    RemoteTrack {
        played_at: None,
        now_playing: true,
        title: "playing".to_string(),
        ..remote_track(0)
    }
}

/// Serves a fixed play history the way last.fm does: most recent first,
/// `from` inclusive, `to` exclusive, 1-based pages.
pub struct FakeHistory {
    plays: Mutex<Vec<i64>>,
    now_playing: bool,
    failures_left: Mutex<u32>,
    requests: Mutex<Vec<RecentTracksRequest>>,
}

impl FakeHistory {
    pub fn new(plays: &[i64]) -> Self {
        Self {
            plays: Mutex::new(plays.to_vec()),
            now_playing: false,
            failures_left: Mutex::new(0),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn with_now_playing(mut self) -> Self {
        self.now_playing = true;
        self
    }

    /// The next `count` calls fail before any paging happens.
    pub fn fail_next(&self, count: u32) {
        *self.failures_left.lock().unwrap() = count;
    }

    pub fn add_plays(&self, plays: &[i64]) {
        self.plays.lock().unwrap().extend_from_slice(plays);
    }

    pub fn requests(&self) -> Vec<RecentTracksRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl RecentTracksSource for FakeHistory {
    async fn recent_tracks(&self, request: &RecentTracksRequest) -> Result<RecentTracksPage> {
        self.requests.lock().unwrap().push(request.clone());
        {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                bail!("simulated outage");
            }
        }

        let mut matching: Vec<i64> = self
            .plays
            .lock()
            .unwrap()
            .iter()
            .copied()
            .filter(|ts| request.from.map_or(true, |from| *ts >= from))
            .filter(|ts| request.to.map_or(true, |to| *ts < to))
            .collect();
        matching.sort_unstable_by(|a, b| b.cmp(a));

        let limit = request.limit.max(1) as usize;
        let total = matching.len();
        let total_pages = total.div_ceil(limit) as u32;
        let page = request.page.unwrap_or(1).max(1);

        let mut tracks: Vec<RemoteTrack> = matching
            .into_iter()
            .skip((page as usize - 1) * limit)
            .take(limit)
            .map(remote_track)
            .collect();
        if self.now_playing && page == 1 {
            tracks.insert(0, now_playing_track());
        }

        Ok(RecentTracksPage {
            tracks,
            page,
            total_pages,
            total_tracks: total as u64,
        })
    }
}
