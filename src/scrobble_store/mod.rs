mod models;
mod schema;
mod sqlite_scrobble_store;

pub use models::*;
pub use schema::SCROBBLE_VERSIONED_SCHEMAS;
pub use sqlite_scrobble_store::SqliteScrobbleStore;

use anyhow::Result;

/// Durable home of the listening history.
pub trait ScrobbleStore: Send + Sync {
    /// Identity of the backing store, recorded in checkpoints so a cursor is
    /// never resumed against a different database.
    fn location(&self) -> String;

    /// Most recent `played_at` in the store, `None` when empty.
    fn latest_timestamp(&self) -> Result<Option<i64>>;

    /// Inserts the whole batch in one transaction or nothing at all.
    /// Returns the number of rows inserted.
    fn store_activity(&self, records: &[ScrobbleRecord]) -> Result<usize>;

    /// Rows with `played_at >= since`, most recent first.
    fn activity_since(&self, since: i64) -> Result<Vec<StoredActivity>>;

    /// Sets the duplicate flag on the given rows in one transaction.
    fn mark_duplicates(&self, ids: &[i64]) -> Result<usize>;

    fn activity_count(&self) -> Result<usize>;
}
