use super::models::{NamedRef, ScrobbleRecord, StoredActivity};
use super::schema::SCROBBLE_VERSIONED_SCHEMAS;
use super::ScrobbleStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub struct SqliteScrobbleStore {
    conn: Arc<Mutex<Connection>>,
    location: String,
}

impl SqliteScrobbleStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open scrobble database")?;

        if is_new_db {
            info!("Creating new scrobble database at {:?}", path);
            Self::latest_schema()?.create(&conn)?;
        } else {
            Self::check_existing(&conn)?;
        }
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: path.to_string_lossy().to_string(),
        })
    }

    /// Opens a private in-memory database. `label` stands in for the
    /// database path when comparing checkpoint identities.
    pub fn in_memory(label: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::latest_schema()?.create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: label.to_string(),
        })
    }

    fn latest_schema() -> Result<&'static crate::sqlite_persistence::VersionedSchema> {
        SCROBBLE_VERSIONED_SCHEMAS
            .last()
            .ok_or_else(|| anyhow!("No scrobble schema defined"))
    }

    fn check_existing(conn: &Connection) -> Result<()> {
        let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let db_version = raw_version - BASE_DB_VERSION as i64;
        if db_version < 1 {
            anyhow::bail!(
                "Scrobble database version {} is invalid (expected >= 1)",
                db_version
            );
        }

        let schema = SCROBBLE_VERSIONED_SCHEMAS
            .iter()
            .find(|s| s.version == db_version as usize)
            .with_context(|| format!("Unknown scrobble database version {}", db_version))?;
        schema.validate(conn).with_context(|| {
            format!(
                "Scrobble database schema validation failed for version {}",
                db_version
            )
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Scrobble database lock poisoned"))
    }

    fn get_or_create_named(tx: &Transaction, table: &str, named: &NamedRef) -> Result<i64> {
        // `IS` matches NULL against NULL, so a missing mbid is its own identity.
        let existing: Option<i64> = tx
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?1 AND mbid IS ?2", table),
                params![named.name, named.id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        tx.execute(
            &format!("INSERT INTO {} (name, mbid) VALUES (?1, ?2)", table),
            params![named.name, named.id],
        )
        .with_context(|| format!("Failed to insert {} {:?}", table, named.name))?;
        Ok(tx.last_insert_rowid())
    }

    fn get_or_create_image(tx: &Transaction, url: &str) -> Result<i64> {
        let existing: Option<i64> = tx
            .query_row("SELECT id FROM image WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        tx.execute("INSERT INTO image (url) VALUES (?1)", params![url])?;
        Ok(tx.last_insert_rowid())
    }

    fn format_played_at(played_at: i64) -> Result<String> {
        DateTime::<Utc>::from_timestamp(played_at, 0)
            .map(|dt| dt.to_rfc3339())
            .ok_or_else(|| anyhow!("Timestamp out of range: {}", played_at))
    }

    fn insert_record(tx: &Transaction, record: &ScrobbleRecord) -> Result<()> {
        let artist_id = Self::get_or_create_named(tx, "artist", &record.artist)?;
        let album_id = Self::get_or_create_named(tx, "album", &record.album)?;
        let image_id = match record.image_url.as_deref() {
            Some(url) if !url.is_empty() => Some(Self::get_or_create_image(tx, url)?),
            _ => None,
        };

        tx.execute(
            "INSERT INTO activity (uts, dt, title, mbid, url, artist, artist_id, album, album_id, image_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.played_at,
                Self::format_played_at(record.played_at)?,
                record.title,
                record.external_id,
                record.url,
                record.artist.name,
                artist_id,
                record.album.name,
                album_id,
                image_id,
            ],
        )
        .with_context(|| format!("Failed to insert activity {:?}", record.title))?;
        Ok(())
    }
}

impl ScrobbleStore for SqliteScrobbleStore {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn latest_timestamp(&self) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let max: Option<i64> = conn.query_row("SELECT max(uts) FROM activity", [], |row| {
            row.get(0)
        })?;
        Ok(max)
    }

    fn store_activity(&self, records: &[ScrobbleRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in records {
            // Dropping `tx` on the error path rolls the whole batch back.
            Self::insert_record(&tx, record)?;
        }
        tx.commit().context("Failed to commit activity batch")?;
        debug!("Committed {} activity rows", records.len());
        Ok(records.len())
    }

    fn activity_since(&self, since: i64) -> Result<Vec<StoredActivity>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, uts, title, artist, album, duplicate
             FROM activity WHERE uts >= ?1 ORDER BY uts DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok(StoredActivity {
                    id: row.get(0)?,
                    played_at: row.get(1)?,
                    title: row.get(2)?,
                    artist_name: row.get(3)?,
                    album_name: row.get(4)?,
                    duplicate: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn mark_duplicates(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE activity SET duplicate = 1 WHERE id = ?1")?;
            for id in ids {
                updated += stmt.execute(params![id])?;
            }
        }
        tx.commit().context("Failed to commit duplicate flags")?;
        Ok(updated)
    }

    fn activity_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT count(*) FROM activity", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
