use serde::{Deserialize, Serialize};

/// A named entity as reported by the remote service, with its optional
/// external (MusicBrainz) id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
    pub id: Option<String>,
}

impl NamedRef {
    pub fn new(name: impl Into<String>, id: Option<String>) -> Self {
        Self {
            name: name.into(),
            id: id.filter(|id| !id.is_empty()),
        }
    }
}

/// A single play ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrobbleRecord {
    pub external_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub artist: NamedRef,
    pub album: NamedRef,
    /// Epoch seconds.
    pub played_at: i64,
    pub image_url: Option<String>,
    /// Only ever set by the duplicate detector, never on ingestion.
    pub duplicate: bool,
}

/// The slice of an `activity` row needed for duplicate scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredActivity {
    pub id: i64,
    pub played_at: i64,
    pub title: String,
    pub artist_name: String,
    pub album_name: String,
    pub duplicate: bool,
}

impl StoredActivity {
    pub fn same_track(&self, other: &StoredActivity) -> bool {
        self.title == other.title
            && self.artist_name == other.artist_name
            && self.album_name == other.album_name
    }
}
