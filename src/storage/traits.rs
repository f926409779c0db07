//! Storage trait and error types

use crate::catalog::{AlbumPayload, ArtistPayload, EnrichmentPayload, EntityKind, TrackPayload};
use crate::storage::{AlbumRow, ArtistRow, TrackRow};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Idempotent persistence over the catalog schema
///
/// Every `upsert_*` call persists one fetched batch in a single
/// transaction: primary rows fully overwrite mutable columns, foreign
/// references discovered inside the payloads become stub rows, and
/// relation rows are inserted ignoring primary-key conflicts. Replaying
/// a batch leaves the store unchanged.
pub trait CatalogStore {
    // ===== Batch persistence =====

    /// Persists full track payloads, stubbing their albums and artists
    fn upsert_tracks(&mut self, tracks: &[TrackPayload]) -> StorageResult<()>;

    /// Persists full album payloads, stubbing their artists and track list
    fn upsert_albums(&mut self, albums: &[AlbumPayload]) -> StorageResult<()>;

    /// Persists full artist payloads and any genres they carry
    ///
    /// Does not touch `albums_retrieved` or `area_id`: completion is
    /// monotonic, a re-fetch never reverts backfill or enrichment state.
    fn upsert_artists(&mut self, artists: &[ArtistPayload]) -> StorageResult<()>;

    /// Persists area and genre data from the secondary enrichment source
    fn upsert_artist_enrichment(
        &mut self,
        artist_id: &str,
        enrichment: &EnrichmentPayload,
    ) -> StorageResult<()>;

    /// Marks an artist's discography as fully walked
    fn mark_albums_retrieved(&mut self, artist_id: &str) -> StorageResult<()>;

    /// Inserts ID-only stub rows, used when seeding the initial frontier
    fn insert_stubs(&mut self, kind: EntityKind, ids: &[String]) -> StorageResult<()>;

    // ===== Scheduler queries =====

    /// Counts rows of a kind that still lack their full payload
    fn count_incomplete(&self, kind: EntityKind) -> StorageResult<u64>;

    /// Samples incomplete row IDs in no significant order
    fn sample_incomplete(&self, kind: EntityKind, limit: u32) -> StorageResult<Vec<String>>;

    /// Counts named artists whose discography has not been walked
    fn count_artists_pending_albums(&self) -> StorageResult<u64>;

    /// Samples artists for the album backfill phase, most popular first
    fn sample_artists_pending_albums(&self, limit: u32) -> StorageResult<Vec<String>>;

    /// Samples `(id, name)` of named artists lacking area or genre data
    fn sample_artists_pending_enrichment(
        &self,
        limit: u32,
    ) -> StorageResult<Vec<(String, String)>>;

    // ===== Row access and statistics =====

    fn get_track(&self, id: &str) -> StorageResult<Option<TrackRow>>;
    fn get_album(&self, id: &str) -> StorageResult<Option<AlbumRow>>;
    fn get_artist(&self, id: &str) -> StorageResult<Option<ArtistRow>>;

    /// Total row count for a kind, stubs included
    fn count_rows(&self, kind: EntityKind) -> StorageResult<u64>;

    /// Relation row count for a relation table name
    fn count_relations(&self, relation: &str) -> StorageResult<u64>;

    // ===== Lifecycle =====

    /// Drops and recreates the whole schema
    fn reset(&mut self) -> StorageResult<()>;
}
