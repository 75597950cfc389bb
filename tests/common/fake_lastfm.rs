//! A stand-in for the last.fm `user.getRecentTracks` endpoint.
//!
//! Serves a fixed history newest first, honouring `from` (inclusive), `to`
//! (exclusive), `page` and `limit` the way the real API does.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct History {
    plays: Vec<i64>,
    now_playing: bool,
    requests: Vec<HashMap<String, String>>,
}

type SharedHistory = Arc<Mutex<History>>;

pub struct FakeLastFm {
    pub base_url: String,
    history: SharedHistory,
    shutdown: CancellationToken,
}

impl FakeLastFm {
    pub async fn spawn(plays: &[i64]) -> Self {
        let history: SharedHistory = Arc::new(Mutex::new(History {
            plays: plays.to_vec(),
            ..Default::default()
        }));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake last.fm");
        let addr = listener.local_addr().expect("Failed to get local address");

        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();
        let app = Router::new()
            .route("/", get(recent_tracks))
            .with_state(history.clone());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Fake last.fm failed");
        });

        Self {
            base_url: format!("http://{}/", addr),
            history,
            shutdown,
        }
    }

    pub fn add_plays(&self, plays: &[i64]) {
        self.history.lock().unwrap().plays.extend_from_slice(plays);
    }

    pub fn set_now_playing(&self, now_playing: bool) {
        self.history.lock().unwrap().now_playing = now_playing;
    }

    pub fn request_count(&self) -> usize {
        self.history.lock().unwrap().requests.len()
    }

    /// Query string of every request served so far.
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.history.lock().unwrap().requests.clone()
    }
}

impl Drop for FakeLastFm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn track_json(played_at: i64) -> Value {
    json!({
        "name": format!("Track {}", played_at),
        "mbid": "",
        "url": format!("https://www.last.fm/music/Artist/_/Track+{}", played_at),
        "artist": {"#text": "Artist", "mbid": ""},
        "album": {"#text": "Album", "mbid": ""},
        "image": [
            {"size": "small", "#text": "https://img.example/s.png"},
            {"size": "extralarge", "#text": "https://img.example/xl.png"}
        ],
        "date": {"uts": played_at.to_string(), "#text": ""}
    })
}

async fn recent_tracks(
    State(history): State<SharedHistory>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut history = history.lock().unwrap();
    history.requests.push(params.clone());

    if params.get("api_key").map(String::as_str) != Some("test-key") {
        return Json(json!({"error": 10, "message": "Invalid API key"}));
    }

    let number = |name: &str| params.get(name).and_then(|v| v.parse::<i64>().ok());
    let from = number("from").unwrap_or(i64::MIN);
    let to = number("to").unwrap_or(i64::MAX);
    let page = number("page").unwrap_or(1).max(1) as usize;
    let limit = number("limit").unwrap_or(50).max(1) as usize;

    let mut matching: Vec<i64> = history
        .plays
        .iter()
        .copied()
        .filter(|ts| *ts >= from && *ts < to)
        .collect();
    matching.sort_unstable_by(|a, b| b.cmp(a));

    let total = matching.len();
    let total_pages = total.div_ceil(limit);
    let mut tracks: Vec<Value> = matching
        .iter()
        .skip((page - 1) * limit)
        .take(limit)
        .map(|ts| track_json(*ts))
        .collect();

    if history.now_playing && page == 1 {
        tracks.insert(
            0,
            json!({
                "name": "Playing Now",
                "artist": {"#text": "Artist"},
                "album": {"#text": "Album"},
                "@attr": {"nowplaying": "true"}
            }),
        );
    }

    Json(json!({
        "recenttracks": {
            "track": tracks,
            "@attr": {
                "user": params.get("user").cloned().unwrap_or_default(),
                "page": page.to_string(),
                "perPage": limit.to_string(),
                "totalPages": total_pages.to_string(),
                "total": total.to_string()
            }
        }
    }))
}
