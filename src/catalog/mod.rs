//! Catalog entity model
//!
//! This module defines the closed set of entity kinds tracked by the
//! synchronizer and the typed payload DTOs decoded from upstream responses.

mod payload;

pub use payload::{
    widen_release_date, AlbumPayload, AreaInfo, ArtistPayload, ArtistRef, EnrichmentPayload,
    FollowerCount, Page, SavedTrackItem, SimplifiedAlbum, TrackPayload, TrackRef,
};

/// The closed enumeration of batch-fetchable entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Track,
    Album,
    Artist,
}

impl EntityKind {
    /// Maximum number of IDs accepted by the upstream batch endpoint
    pub fn batch_limit(&self) -> usize {
        match self {
            Self::Track => 50,
            Self::Artist => 50,
            Self::Album => 20,
        }
    }

    /// URL path segment and response key for the batch endpoint
    ///
    /// Batch responses wrap the payload array under this key, e.g.
    /// `{"tracks": [...]}` for `GET /tracks?ids=...`.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Track => "tracks",
            Self::Album => "albums",
            Self::Artist => "artists",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "track" | "tracks" => Some(Self::Track),
            "album" | "albums" => Some(Self::Album),
            "artist" | "artists" => Some(Self::Artist),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
