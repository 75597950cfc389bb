//! Remote listening-history source (last.fm) and outbound throttling.

mod client;
mod models;
mod throttle;

pub use client::{LastFmClient, LastFmError, RecentTracksSource, LASTFM_API_BASE};
pub use models::{RecentTracksPage, RecentTracksRequest, RemoteImage, RemoteTrack};
pub use throttle::RateLimiter;
