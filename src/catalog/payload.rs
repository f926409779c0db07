//! Typed decode-time DTOs for upstream payloads
//!
//! Every entity kind decodes into an explicit struct with optional fields
//! where the upstream omits data. A payload that fails to decode becomes a
//! `FetchError::MalformedResponse` at the call site rather than a dynamic
//! key lookup failure deep inside persistence code.

use chrono::NaiveDate;
use serde::Deserialize;

/// A paginated response envelope: `{total, items, next?}`
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// A minimal artist reference embedded in track and album payloads
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A minimal album reference embedded in track payloads
#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedAlbum {
    pub id: String,
}

/// A minimal track reference embedded in full album payloads
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRef {
    pub id: String,
}

/// A full track object from the batch or singleton track endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TrackPayload {
    pub id: String,
    pub name: String,
    pub album: SimplifiedAlbum,
    #[serde(default = "Vec::new")]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub explicit: Option<bool>,
    #[serde(default)]
    pub track_number: Option<i64>,
}

/// A full album object from the batch album endpoint
///
/// The embedded `tracks` page carries track IDs only; those become stub
/// rows to be completed by a later track batch.
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default = "Vec::new")]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub tracks: Option<Page<TrackRef>>,
}

/// Follower count wrapper as the upstream nests it
#[derive(Debug, Clone, Deserialize)]
pub struct FollowerCount {
    #[serde(default)]
    pub total: Option<i64>,
}

/// A full artist object from the batch artist endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub followers: Option<FollowerCount>,
    #[serde(default = "Vec::new")]
    pub genres: Vec<String>,
}

/// One item of the authenticated user's saved-tracks collection
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrackItem {
    pub track: TrackPayload,
}

/// Area information from the secondary enrichment source
#[derive(Debug, Clone, Deserialize)]
pub struct AreaInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub area_type: Option<String>,
}

/// Artist enrichment payload from the secondary source (area + genres)
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentPayload {
    #[serde(default)]
    pub area: Option<AreaInfo>,
    #[serde(default = "Vec::new")]
    pub genres: Vec<String>,
}

/// Widens a partial release date to full date granularity
///
/// The upstream reports release dates at year, month, or day precision.
/// Year-only and year-month inputs are widened to the first day of the
/// period; anything that still fails to parse as a date yields `None`.
pub fn widen_release_date(raw: &str) -> Option<String> {
    let widened = match raw.len() {
        4 => format!("{}-01-01", raw),
        7 => format!("{}-01", raw),
        _ => raw.to_string(),
    };

    NaiveDate::parse_from_str(&widened, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_year_only() {
        assert_eq!(widen_release_date("1994"), Some("1994-01-01".to_string()));
    }

    #[test]
    fn test_widen_year_month() {
        assert_eq!(
            widen_release_date("2003-07"),
            Some("2003-07-01".to_string())
        );
    }

    #[test]
    fn test_widen_full_date_unchanged() {
        assert_eq!(
            widen_release_date("2020-02-29"),
            Some("2020-02-29".to_string())
        );
    }

    #[test]
    fn test_widen_invalid() {
        assert_eq!(widen_release_date("unknown"), None);
        assert_eq!(widen_release_date(""), None);
        assert_eq!(widen_release_date("2021-13"), None);
    }

    #[test]
    fn test_track_payload_decodes() {
        let raw = serde_json::json!({
            "id": "t1",
            "name": "Song",
            "album": {"id": "a1"},
            "artists": [{"id": "ar1", "name": "Band"}],
            "duration_ms": 215000,
            "popularity": 64,
            "explicit": false,
            "track_number": 3
        });

        let track: TrackPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.album.id, "a1");
        assert_eq!(track.artists.len(), 1);
        assert_eq!(track.duration_ms, Some(215000));
    }

    #[test]
    fn test_track_payload_missing_name_fails() {
        let raw = serde_json::json!({
            "id": "t1",
            "album": {"id": "a1"}
        });

        let result: std::result::Result<TrackPayload, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }

    #[test]
    fn test_album_payload_optional_fields() {
        let raw = serde_json::json!({
            "id": "a1",
            "name": "Album",
            "release_date": "1999",
            "tracks": {"total": 2, "items": [{"id": "t1"}, {"id": "t2"}]}
        });

        let album: AlbumPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(album.label, None);
        assert_eq!(album.tracks.unwrap().items.len(), 2);
    }

    #[test]
    fn test_enrichment_payload_without_area() {
        let raw = serde_json::json!({"genres": ["shoegaze"]});
        let payload: EnrichmentPayload = serde_json::from_value(raw).unwrap();
        assert!(payload.area.is_none());
        assert_eq!(payload.genres, vec!["shoegaze".to_string()]);
    }
}
