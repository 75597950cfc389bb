//! HTTP client for the last.fm `user.getRecentTracks` endpoint.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::models::{RawEnvelope, RecentTracksPage, RecentTracksRequest};

pub const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LastFmError {
    #[error("request to last.fm failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("last.fm error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("unexpected last.fm response: {0}")]
    Decode(String),
}

/// Source of paginated listening history. Implemented over HTTP by
/// [`LastFmClient`] and by in-memory fakes in tests.
#[async_trait]
pub trait RecentTracksSource: Send + Sync {
    async fn recent_tracks(&self, request: &RecentTracksRequest) -> Result<RecentTracksPage>;
}

pub struct LastFmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LastFmClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, LASTFM_API_BASE)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn query_params(&self, request: &RecentTracksRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("method", "user.getrecenttracks".to_string()),
            ("user", request.account_id.clone()),
            ("api_key", self.api_key.clone()),
            ("format", "json".to_string()),
        ];
        if let Some(from) = request.from {
            params.push(("from", from.to_string()));
        }
        if let Some(to) = request.to {
            params.push(("to", to.to_string()));
        }
        if let Some(page) = request.page {
            params.push(("page", page.to_string()));
        }
        params.push(("limit", request.limit.to_string()));
        params
    }

    pub async fn get_recent_tracks(
        &self,
        request: &RecentTracksRequest,
    ) -> Result<RecentTracksPage, LastFmError> {
        debug!(
            "getRecentTracks user={} from={:?} to={:?} page={:?}",
            request.account_id, request.from, request.to, request.page
        );
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(request))
            .send()
            .await?;

        // last.fm reports API errors with a JSON body on non-2xx statuses too,
        // so the body is decoded before looking at the status.
        let status = response.status();
        let body = response.text().await?;
        match decode_body(&body) {
            Err(LastFmError::Decode(_)) if !status.is_success() => Err(LastFmError::Decode(
                format!("status {} with undecodable body", status),
            )),
            other => other,
        }
    }
}

pub(crate) fn decode_body(body: &str) -> Result<RecentTracksPage, LastFmError> {
    let envelope: RawEnvelope =
        serde_json::from_str(body).map_err(|e| LastFmError::Decode(e.to_string()))?;
    if let Some(code) = envelope.error {
        return Err(LastFmError::Api {
            code,
            message: envelope.message.unwrap_or_default(),
        });
    }
    envelope
        .recenttracks
        .ok_or_else(|| LastFmError::Decode("missing recenttracks".to_string()))?
        .into_page()
        .map_err(LastFmError::Decode)
}

#[async_trait]
impl RecentTracksSource for LastFmClient {
    async fn recent_tracks(&self, request: &RecentTracksRequest) -> Result<RecentTracksPage> {
        Ok(self.get_recent_tracks(request).await?)
    }
}
