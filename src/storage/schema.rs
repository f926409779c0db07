//! Database schema definitions
//!
//! All DDL is idempotent (`CREATE TABLE IF NOT EXISTS`); there are no
//! migrations. Schema changes require a destructive reset.

/// SQL schema for the catalog database
pub const SCHEMA_SQL: &str = r#"
-- Tracks: complete when name is known
CREATE TABLE IF NOT EXISTS tracks (
    id TEXT PRIMARY KEY,
    name TEXT,
    album_id TEXT REFERENCES albums(id),
    duration_ms INTEGER,
    popularity INTEGER,
    explicit INTEGER,
    track_number INTEGER
);

CREATE INDEX IF NOT EXISTS idx_tracks_name ON tracks(name);

-- Albums: complete when name is known
CREATE TABLE IF NOT EXISTS albums (
    id TEXT PRIMARY KEY,
    name TEXT,
    release_date TEXT,
    total_tracks INTEGER,
    label TEXT,
    album_type TEXT,
    popularity INTEGER
);

CREATE INDEX IF NOT EXISTS idx_albums_name ON albums(name);

-- Artists: complete when name is known and, when backfill is enabled,
-- their discography has been walked
CREATE TABLE IF NOT EXISTS artists (
    id TEXT PRIMARY KEY,
    name TEXT,
    popularity INTEGER,
    followers INTEGER,
    albums_retrieved INTEGER NOT NULL DEFAULT 0,
    area_id INTEGER REFERENCES areas(id)
);

CREATE INDEX IF NOT EXISTS idx_artists_name ON artists(name);
CREATE INDEX IF NOT EXISTS idx_artists_albums_retrieved ON artists(albums_retrieved);

-- Genres: surrogate IDs, produced by artist payloads and enrichment
CREATE TABLE IF NOT EXISTS genres (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);

-- Areas: surrogate IDs, produced only by the enrichment source
CREATE TABLE IF NOT EXISTS areas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    type TEXT
);

-- Many-to-many relations; endpoints must exist (as stubs at least)
-- before the relation row is inserted
CREATE TABLE IF NOT EXISTS track_artists (
    track_id TEXT NOT NULL REFERENCES tracks(id),
    artist_id TEXT NOT NULL REFERENCES artists(id),
    PRIMARY KEY (track_id, artist_id)
);

CREATE TABLE IF NOT EXISTS album_artists (
    album_id TEXT NOT NULL REFERENCES albums(id),
    artist_id TEXT NOT NULL REFERENCES artists(id),
    PRIMARY KEY (album_id, artist_id)
);

CREATE TABLE IF NOT EXISTS artist_genres (
    artist_id TEXT NOT NULL REFERENCES artists(id),
    genre_id INTEGER NOT NULL REFERENCES genres(id),
    PRIMARY KEY (artist_id, genre_id)
);
"#;

/// Tables in child-before-parent order, for the destructive reset
pub const TABLES_DROP_ORDER: &[&str] = &[
    "track_artists",
    "album_artists",
    "artist_genres",
    "tracks",
    "albums",
    "artists",
    "genres",
    "areas",
];

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
