//! Scrobble Sync Library
//!
//! Mirrors a last.fm listening history into a local SQLite database and keeps
//! it fresh, pushing update notices to live WebSocket viewers.

pub mod config;
pub mod lastfm;
pub mod live;
pub mod scheduler;
pub mod scrobble_store;
pub mod server;
pub mod sqlite_persistence;
pub mod state_store;
pub mod sync;

// Re-export commonly used types for convenience
pub use lastfm::{LastFmClient, RecentTracksSource};
pub use live::ClientRegistry;
pub use scheduler::{OrchestratorRunner, UpdateRequest, UpdateScheduler};
pub use scrobble_store::{ScrobbleStore, SqliteScrobbleStore};
pub use server::{run_server, ServerState};
pub use state_store::{FileStateStore, StateStore};
pub use sync::{FetchOptions, FetchOrchestrator, FetchResult, SyncError};
