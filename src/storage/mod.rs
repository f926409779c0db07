//! Catalog persistence
//!
//! SQLite-backed storage for the synchronized catalog. The schema keeps
//! one table per entity kind plus surrogate-keyed genre and area tables
//! and the three many-to-many relation tables. Rows exist in two states:
//! stubs (ID only, discovered through references in other payloads) and
//! complete rows (full payload persisted). The scheduler drives stubs
//! toward completeness; nothing in the store ever moves a row back.

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL, TABLES_DROP_ORDER};
pub use sqlite::SqliteStore;
pub use traits::{CatalogStore, StorageError, StorageResult};

/// A track row as stored, nullable columns still unset on stubs
#[derive(Debug, Clone)]
pub struct TrackRow {
    pub id: String,
    pub name: Option<String>,
    pub album_id: Option<String>,
    pub duration_ms: Option<i64>,
    pub popularity: Option<i64>,
    pub explicit: Option<bool>,
    pub track_number: Option<i64>,
}

/// An album row as stored
#[derive(Debug, Clone)]
pub struct AlbumRow {
    pub id: String,
    pub name: Option<String>,
    pub release_date: Option<String>,
    pub total_tracks: Option<i64>,
    pub label: Option<String>,
    pub album_type: Option<String>,
    pub popularity: Option<i64>,
}

/// An artist row as stored
#[derive(Debug, Clone)]
pub struct ArtistRow {
    pub id: String,
    pub name: Option<String>,
    pub popularity: Option<i64>,
    pub followers: Option<i64>,
    pub albums_retrieved: bool,
    pub area_id: Option<i64>,
}
