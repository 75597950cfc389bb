//! Types for `user.getRecentTracks`.
//!
//! The raw JSON is loose: numbers arrive as strings, a single track is sent
//! as an object instead of a one-element array, and the currently playing
//! track carries no date. The `Raw*` structs absorb that and are converted
//! into the strict [`RecentTracksPage`].

use serde::Deserialize;

use crate::scrobble_store::{NamedRef, ScrobbleRecord};

/// One paginated request. `None` fields are omitted from the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTracksRequest {
    pub account_id: String,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub page: Option<u32>,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub size: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub external_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub artist: NamedRef,
    pub album: NamedRef,
    pub images: Vec<RemoteImage>,
    /// Epoch seconds; absent for the now-playing track.
    pub played_at: Option<i64>,
    pub now_playing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTracksPage {
    pub tracks: Vec<RemoteTrack>,
    pub page: u32,
    pub total_pages: u32,
    pub total_tracks: u64,
}

fn image_weight(size: &str) -> u8 {
    match size {
        "small" => 1,
        "medium" => 2,
        "large" => 3,
        "extralarge" => 4,
        _ => 0,
    }
}

impl RemoteTrack {
    /// Url of the largest known image size, if any.
    pub fn best_image_url(&self) -> Option<&str> {
        self.images
            .iter()
            .filter(|img| !img.url.is_empty() && image_weight(&img.size) > 0)
            .max_by_key(|img| image_weight(&img.size))
            .map(|img| img.url.as_str())
    }

    /// Converts a played track into a storable record. The now-playing track
    /// is never storable.
    pub fn to_record(&self) -> Option<ScrobbleRecord> {
        if self.now_playing {
            return None;
        }
        Some(ScrobbleRecord {
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            played_at: self.played_at?,
            image_url: self.best_image_url().map(str::to_string),
            duplicate: false,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawEnvelope {
    pub recenttracks: Option<RawRecentTracks>,
    pub error: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawRecentTracks {
    #[serde(default)]
    track: OneOrMany<RawTrack>,
    #[serde(rename = "@attr")]
    attr: RawPageAttr,
}

#[derive(Debug, Deserialize)]
struct RawPageAttr {
    page: String,
    #[serde(rename = "totalPages")]
    total_pages: String,
    total: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawNamed {
    #[serde(rename = "#text", default)]
    text: String,
    #[serde(default)]
    mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(default)]
    size: String,
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawDate {
    uts: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawTrackAttr {
    #[serde(default)]
    nowplaying: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(default)]
    name: String,
    #[serde(default)]
    mbid: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    artist: RawNamed,
    #[serde(default)]
    album: RawNamed,
    #[serde(default)]
    image: Vec<RawImage>,
    #[serde(default)]
    date: Option<RawDate>,
    #[serde(rename = "@attr", default)]
    attr: RawTrackAttr,
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {}: {:?}", field, value))
}

impl RawTrack {
    fn into_track(self) -> Result<RemoteTrack, String> {
        let now_playing = self.attr.nowplaying.as_deref() == Some("true");
        let played_at = match self.date {
            Some(date) if !now_playing => Some(parse_number::<i64>("date.uts", &date.uts)?),
            _ => None,
        };
        if !now_playing && played_at.is_none() {
            return Err(format!("track {:?} has no play date", self.name));
        }
        Ok(RemoteTrack {
            external_id: self.mbid.filter(|id| !id.is_empty()),
            title: self.name,
            url: self.url.filter(|url| !url.is_empty()),
            artist: NamedRef::new(self.artist.text, self.artist.mbid),
            album: NamedRef::new(self.album.text, self.album.mbid),
            images: self
                .image
                .into_iter()
                .map(|img| RemoteImage {
                    size: img.size,
                    url: img.text,
                })
                .collect(),
            played_at,
            now_playing,
        })
    }
}

impl RawRecentTracks {
    pub(super) fn into_page(self) -> Result<RecentTracksPage, String> {
        let tracks = self
            .track
            .into_vec()
            .into_iter()
            .map(RawTrack::into_track)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RecentTracksPage {
            tracks,
            page: parse_number("page", &self.attr.page)?,
            total_pages: parse_number("totalPages", &self.attr.total_pages)?,
            total_tracks: parse_number("total", &self.attr.total)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "recenttracks": {
            "track": [
                {
                    "artist": {"mbid": "", "#text": "Low"},
                    "image": [
                        {"size": "small", "#text": "http://img/s.png"},
                        {"size": "extralarge", "#text": "http://img/xl.png"},
                        {"size": "medium", "#text": "http://img/m.png"}
                    ],
                    "mbid": "",
                    "album": {"mbid": "alb-1", "#text": "Double Negative"},
                    "name": "Quorum",
                    "@attr": {"nowplaying": "true"},
                    "url": "https://www.last.fm/music/Low/_/Quorum"
                },
                {
                    "artist": {"mbid": "art-1", "#text": "Low"},
                    "image": [],
                    "mbid": "trk-1",
                    "album": {"mbid": "", "#text": "Double Negative"},
                    "name": "Dancing and Blood",
                    "url": "https://www.last.fm/music/Low/_/Dancing+and+Blood",
                    "date": {"uts": "1600000000", "#text": "13 Sep 2020, 12:26"}
                }
            ],
            "@attr": {"user": "someone", "totalPages": "7", "page": "2", "perPage": "200", "total": "1301"}
        }
    }"##;

    fn parse(json: &str) -> RecentTracksPage {
        let envelope: RawEnvelope = serde_json::from_str(json).unwrap();
        envelope.recenttracks.unwrap().into_page().unwrap()
    }

    #[test]
    fn parses_page_attributes_from_strings() {
        let page = parse(SAMPLE);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 7);
        assert_eq!(page.total_tracks, 1301);
        assert_eq!(page.tracks.len(), 2);
    }

    #[test]
    fn now_playing_track_has_no_timestamp_and_no_record() {
        let page = parse(SAMPLE);
        let playing = &page.tracks[0];
        assert!(playing.now_playing);
        assert_eq!(playing.played_at, None);
        assert!(playing.to_record().is_none());
    }

    #[test]
    fn played_track_converts_to_record() {
        let page = parse(SAMPLE);
        let record = page.tracks[1].to_record().unwrap();
        assert_eq!(record.title, "Dancing and Blood");
        assert_eq!(record.played_at, 1_600_000_000);
        assert_eq!(record.external_id.as_deref(), Some("trk-1"));
        assert_eq!(record.artist.id.as_deref(), Some("art-1"));
        // empty mbid strings are treated as absent
        assert_eq!(record.album.id, None);
        assert!(!record.duplicate);
    }

    #[test]
    fn best_image_prefers_largest_size() {
        let page = parse(SAMPLE);
        assert_eq!(page.tracks[0].best_image_url(), Some("http://img/xl.png"));
        assert_eq!(page.tracks[1].best_image_url(), None);
    }

    #[test]
    fn single_track_object_is_accepted() {
        let json = r##"{"recenttracks": {
            "track": {"artist": {"#text": "A"}, "album": {"#text": "B"}, "name": "C",
                      "date": {"uts": "42"}},
            "@attr": {"totalPages": "1", "page": "1", "total": "1"}
        }}"##;
        let page = parse(json);
        assert_eq!(page.tracks.len(), 1);
        assert_eq!(page.tracks[0].played_at, Some(42));
    }

    #[test]
    fn empty_history_has_zero_pages() {
        let json = r#"{"recenttracks": {
            "track": [],
            "@attr": {"totalPages": "0", "page": "1", "total": "0"}
        }}"#;
        let page = parse(json);
        assert!(page.tracks.is_empty());
        assert_eq!(page.total_pages, 0);
    }
}
