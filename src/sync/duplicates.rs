//! Flags plays that were scrobbled twice in quick succession.
//!
//! Only neighbouring rows in `played_at` order are compared, so a repeat
//! separated by another track (A, B, A) is never flagged.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::scrobble_store::{ScrobbleStore, StoredActivity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub checked_count: usize,
    pub duplicate_count: usize,
    pub duplicate_ids: Vec<i64>,
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = if self.checked_count == 0 {
            0.0
        } else {
            self.duplicate_count as f64 / self.checked_count as f64 * 100.0
        };
        write!(
            f,
            "checked {} rows; {} duplicates found ({:.2}%)",
            self.checked_count, self.duplicate_count, pct
        )
    }
}

pub struct DuplicateDetector {
    threshold_secs: i64,
}

impl DuplicateDetector {
    pub fn new(threshold_secs: i64) -> Self {
        Self { threshold_secs }
    }

    /// `rows` must be ordered by `played_at` descending. Of each adjacent
    /// matching pair, the earlier-played row is reported.
    pub fn find(&self, rows: &[StoredActivity]) -> DuplicateReport {
        let duplicate_ids: Vec<i64> = rows
            .windows(2)
            .filter(|pair| {
                let (newer, older) = (&pair[0], &pair[1]);
                newer.same_track(older)
                    && (newer.played_at - older.played_at).abs() <= self.threshold_secs
            })
            .map(|pair| pair[1].id)
            .collect();

        DuplicateReport {
            checked_count: rows.len(),
            duplicate_count: duplicate_ids.len(),
            duplicate_ids,
        }
    }

    /// Scans every row played at or after `since` and flags the duplicates
    /// in a single transaction.
    pub fn flag(&self, store: &dyn ScrobbleStore, since: i64) -> Result<DuplicateReport> {
        let rows = store.activity_since(since)?;
        let report = self.find(&rows);
        if !report.duplicate_ids.is_empty() {
            let flagged = store.mark_duplicates(&report.duplicate_ids)?;
            info!("Flagged {} duplicate plays since {}", flagged, since);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrobble_store::{NamedRef, ScrobbleRecord, SqliteScrobbleStore};

    fn row(id: i64, played_at: i64, title: &str) -> StoredActivity {
        StoredActivity {
            id,
            played_at,
            title: title.to_string(),
            artist_name: "artist".to_string(),
            album_name: "album".to_string(),
            duplicate: false,
        }
    }

    #[test]
    fn gap_within_threshold_flags_earlier_play() {
        let detector = DuplicateDetector::new(30);
        let report = detector.find(&[row(2, 1030, "a"), row(1, 1000, "a")]);
        assert_eq!(report.duplicate_ids, vec![1]);
        assert_eq!(report.checked_count, 2);
    }

    #[test]
    fn gap_beyond_threshold_flags_nothing() {
        let detector = DuplicateDetector::new(30);
        let report = detector.find(&[row(2, 1031, "a"), row(1, 1000, "a")]);
        assert!(report.duplicate_ids.is_empty());
    }

    #[test]
    fn different_tracks_are_not_duplicates() {
        let detector = DuplicateDetector::new(30);
        let mut other_album = row(1, 1000, "a");
        other_album.album_name = "live".to_string();
        let report = detector.find(&[row(2, 1010, "a"), other_album]);
        assert_eq!(report.duplicate_count, 0);
    }

    #[test]
    fn interleaved_repeat_is_not_detected() {
        let detector = DuplicateDetector::new(300);
        let report = detector.find(&[row(3, 1020, "a"), row(2, 1010, "b"), row(1, 1000, "a")]);
        assert_eq!(report.duplicate_count, 0);
    }

    #[test]
    fn triple_play_flags_all_but_newest() {
        let detector = DuplicateDetector::new(30);
        let report = detector.find(&[row(3, 1040, "a"), row(2, 1020, "a"), row(1, 1000, "a")]);
        assert_eq!(report.duplicate_ids, vec![2, 1]);
    }

    #[test]
    fn report_display() {
        let report = DuplicateReport {
            checked_count: 8,
            duplicate_count: 1,
            duplicate_ids: vec![4],
        };
        assert_eq!(report.to_string(), "checked 8 rows; 1 duplicates found (12.50%)");
        assert_eq!(
            DuplicateReport::default().to_string(),
            "checked 0 rows; 0 duplicates found (0.00%)"
        );
    }

    #[test]
    fn flag_marks_rows_in_store() {
        let store = SqliteScrobbleStore::in_memory("dups").unwrap();
        let record = |played_at: i64, title: &str| ScrobbleRecord {
            external_id: None,
            title: title.to_string(),
            url: None,
            artist: NamedRef::new("artist", None),
            album: NamedRef::new("album", None),
            played_at,
            image_url: None,
            duplicate: false,
        };
        store
            .store_activity(&[
                record(1000, "a"),
                record(1010, "a"),
                record(2000, "b"),
                record(500, "a"),
            ])
            .unwrap();

        let report = DuplicateDetector::new(30).flag(&store, 900).unwrap();
        assert_eq!(report.checked_count, 3);
        assert_eq!(report.duplicate_count, 1);

        let rows = store.activity_since(0).unwrap();
        let flagged: Vec<i64> = rows.iter().filter(|r| r.duplicate).map(|r| r.played_at).collect();
        assert_eq!(flagged, vec![1000]);
    }
}
