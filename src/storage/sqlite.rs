//! SQLite implementation of the catalog store

use crate::catalog::{
    widen_release_date, AlbumPayload, ArtistPayload, EnrichmentPayload, EntityKind, TrackPayload,
};
use crate::storage::schema::{initialize_schema, TABLES_DROP_ORDER};
use crate::storage::traits::{CatalogStore, StorageResult};
use crate::storage::{AlbumRow, ArtistRow, TrackRow};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the catalog database at the given path
    pub fn new(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Inserts genre names and artist-genre links, creating genres on demand
fn link_genres(tx: &Transaction<'_>, artist_id: &str, genres: &[String]) -> StorageResult<()> {
    let mut insert_genre = tx.prepare_cached("INSERT OR IGNORE INTO genres (name) VALUES (?1)")?;
    let mut link = tx.prepare_cached(
        "INSERT OR IGNORE INTO artist_genres (artist_id, genre_id)
         VALUES (?1, (SELECT id FROM genres WHERE name = ?2))",
    )?;

    for genre in genres {
        insert_genre.execute(params![genre])?;
        link.execute(params![artist_id, genre])?;
    }

    Ok(())
}

impl CatalogStore for SqliteStore {
    fn upsert_tracks(&mut self, tracks: &[TrackPayload]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stub_album =
                tx.prepare_cached("INSERT OR IGNORE INTO albums (id) VALUES (?1)")?;
            let mut stub_artist =
                tx.prepare_cached("INSERT OR IGNORE INTO artists (id) VALUES (?1)")?;
            let mut upsert = tx.prepare_cached(
                "INSERT INTO tracks (id, name, album_id, duration_ms, popularity, explicit, track_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     album_id = excluded.album_id,
                     duration_ms = excluded.duration_ms,
                     popularity = excluded.popularity,
                     explicit = excluded.explicit,
                     track_number = excluded.track_number",
            )?;
            let mut relate = tx.prepare_cached(
                "INSERT OR IGNORE INTO track_artists (track_id, artist_id) VALUES (?1, ?2)",
            )?;

            for track in tracks {
                // Endpoints first: the track row references its album, and
                // relation rows reference both sides
                stub_album.execute(params![track.album.id])?;
                for artist in &track.artists {
                    stub_artist.execute(params![artist.id])?;
                }

                upsert.execute(params![
                    track.id,
                    track.name,
                    track.album.id,
                    track.duration_ms,
                    track.popularity,
                    track.explicit,
                    track.track_number,
                ])?;

                for artist in &track.artists {
                    relate.execute(params![track.id, artist.id])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert_albums(&mut self, albums: &[AlbumPayload]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stub_artist =
                tx.prepare_cached("INSERT OR IGNORE INTO artists (id) VALUES (?1)")?;
            let mut stub_track =
                tx.prepare_cached("INSERT OR IGNORE INTO tracks (id) VALUES (?1)")?;
            let mut upsert = tx.prepare_cached(
                "INSERT INTO albums (id, name, release_date, total_tracks, label, album_type, popularity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     release_date = excluded.release_date,
                     total_tracks = excluded.total_tracks,
                     label = excluded.label,
                     album_type = excluded.album_type,
                     popularity = excluded.popularity",
            )?;
            let mut relate = tx.prepare_cached(
                "INSERT OR IGNORE INTO album_artists (album_id, artist_id) VALUES (?1, ?2)",
            )?;

            for album in albums {
                let release_date = album
                    .release_date
                    .as_deref()
                    .and_then(widen_release_date);

                upsert.execute(params![
                    album.id,
                    album.name,
                    release_date,
                    album.total_tracks,
                    album.label,
                    album.album_type,
                    album.popularity,
                ])?;

                for artist in &album.artists {
                    stub_artist.execute(params![artist.id])?;
                    relate.execute(params![album.id, artist.id])?;
                }

                // The embedded track list grows the incomplete frontier
                if let Some(track_page) = &album.tracks {
                    for track in &track_page.items {
                        stub_track.execute(params![track.id])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert_artists(&mut self, artists: &[ArtistPayload]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO artists (id, name, popularity, followers)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     popularity = excluded.popularity,
                     followers = excluded.followers",
            )?;

            for artist in artists {
                let followers = artist.followers.as_ref().and_then(|f| f.total);
                upsert.execute(params![artist.id, artist.name, artist.popularity, followers])?;
            }
        }

        for artist in artists {
            link_genres(&tx, &artist.id, &artist.genres)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn upsert_artist_enrichment(
        &mut self,
        artist_id: &str,
        enrichment: &EnrichmentPayload,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        if let Some(area) = &enrichment.area {
            tx.execute(
                "INSERT OR IGNORE INTO areas (name, type) VALUES (?1, ?2)",
                params![area.name, area.area_type],
            )?;
            let area_id: i64 = tx.query_row(
                "SELECT id FROM areas WHERE name = ?1",
                params![area.name],
                |row| row.get(0),
            )?;
            tx.execute(
                "UPDATE artists SET area_id = ?1 WHERE id = ?2",
                params![area_id, artist_id],
            )?;
        }

        link_genres(&tx, artist_id, &enrichment.genres)?;

        tx.commit()?;
        Ok(())
    }

    fn mark_albums_retrieved(&mut self, artist_id: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE artists SET albums_retrieved = 1 WHERE id = ?1",
            params![artist_id],
        )?;
        Ok(())
    }

    fn count_incomplete(&self, kind: EntityKind) -> StorageResult<u64> {
        let sql = match kind {
            EntityKind::Track => "SELECT COUNT(id) FROM tracks WHERE name IS NULL",
            EntityKind::Album => "SELECT COUNT(id) FROM albums WHERE name IS NULL",
            EntityKind::Artist => "SELECT COUNT(id) FROM artists WHERE name IS NULL",
        };
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn sample_incomplete(&self, kind: EntityKind, limit: u32) -> StorageResult<Vec<String>> {
        // Random order avoids re-fetch clustering when a batch fails
        let sql = match kind {
            EntityKind::Track => {
                "SELECT id FROM tracks WHERE name IS NULL ORDER BY RANDOM() LIMIT ?1"
            }
            EntityKind::Album => {
                "SELECT id FROM albums WHERE name IS NULL ORDER BY RANDOM() LIMIT ?1"
            }
            EntityKind::Artist => {
                "SELECT id FROM artists WHERE name IS NULL ORDER BY RANDOM() LIMIT ?1"
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![limit], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn count_artists_pending_albums(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(id) FROM artists WHERE albums_retrieved = 0 AND name IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn sample_artists_pending_albums(&self, limit: u32) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM artists
             WHERE albums_retrieved = 0 AND name IS NOT NULL
             ORDER BY popularity DESC LIMIT ?1",
        )?;
        let ids = stmt
            .query_map(params![limit], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn sample_artists_pending_enrichment(
        &self,
        limit: u32,
    ) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name FROM artists
             WHERE name IS NOT NULL
               AND (area_id IS NULL
                    OR id NOT IN (SELECT DISTINCT artist_id FROM artist_genres))
             ORDER BY popularity DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;
        Ok(rows)
    }

    fn get_track(&self, id: &str) -> StorageResult<Option<TrackRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, album_id, duration_ms, popularity, explicit, track_number
             FROM tracks WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(TrackRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    album_id: row.get(2)?,
                    duration_ms: row.get(3)?,
                    popularity: row.get(4)?,
                    explicit: row.get(5)?,
                    track_number: row.get(6)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn get_album(&self, id: &str) -> StorageResult<Option<AlbumRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, release_date, total_tracks, label, album_type, popularity
             FROM albums WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(AlbumRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    release_date: row.get(2)?,
                    total_tracks: row.get(3)?,
                    label: row.get(4)?,
                    album_type: row.get(5)?,
                    popularity: row.get(6)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn get_artist(&self, id: &str) -> StorageResult<Option<ArtistRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, popularity, followers, albums_retrieved, area_id
             FROM artists WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(ArtistRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    popularity: row.get(2)?,
                    followers: row.get(3)?,
                    albums_retrieved: row.get::<_, i64>(4)? != 0,
                    area_id: row.get(5)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn count_rows(&self, kind: EntityKind) -> StorageResult<u64> {
        let sql = match kind {
            EntityKind::Track => "SELECT COUNT(id) FROM tracks",
            EntityKind::Album => "SELECT COUNT(id) FROM albums",
            EntityKind::Artist => "SELECT COUNT(id) FROM artists",
        };
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_relations(&self, relation: &str) -> StorageResult<u64> {
        let sql = match relation {
            "track_artists" => "SELECT COUNT(*) FROM track_artists",
            "album_artists" => "SELECT COUNT(*) FROM album_artists",
            "artist_genres" => "SELECT COUNT(*) FROM artist_genres",
            other => {
                return Err(crate::storage::StorageError::NotFound(format!(
                    "unknown relation table '{}'",
                    other
                )))
            }
        };
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_stubs(&mut self, kind: EntityKind, ids: &[String]) -> StorageResult<()> {
        let sql = match kind {
            EntityKind::Track => "INSERT OR IGNORE INTO tracks (id) VALUES (?1)",
            EntityKind::Album => "INSERT OR IGNORE INTO albums (id) VALUES (?1)",
            EntityKind::Artist => "INSERT OR IGNORE INTO artists (id) VALUES (?1)",
        };

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn reset(&mut self) -> StorageResult<()> {
        for table in TABLES_DROP_ORDER {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;
        }
        initialize_schema(&self.conn)?;
        Ok(())
    }
}
