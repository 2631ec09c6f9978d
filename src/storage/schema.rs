use rusqlite::Connection;

pub mod tables {
    pub const SONGS: &str = "songs";
    pub const TOMBSTONES: &str = "tombstones";
    pub const UPDATES: &str = "updates";

    pub const ALL_TABLES: &[&str] = &[SONGS, TOMBSTONES, UPDATES];
}

pub mod columns {
    pub const SONG_ID: &str = "song_id";
    pub const PATH: &str = "path";
    pub const REMOVED_AT: &str = "removed_at";
    pub const UPDATED_AT: &str = "updated_at";

    /// Columns of the songs table, in the order `row_to_song` reads them.
    pub const SONG_COLUMNS: &str = "song_id, path, name, artist, album, album_artist, genre, \
        composer, comments, track_number, track_count, disc_number, disc_count, year, rating, \
        play_count, last_played, date_added, date_modified, duration_ms, bit_rate, sample_rate, \
        size, kind";
}

pub use columns::*;
pub use tables::*;

// AUTOINCREMENT keeps removed ids from ever being handed out again.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS songs (
    song_id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    artist TEXT NOT NULL DEFAULT '',
    album TEXT NOT NULL DEFAULT '',
    album_artist TEXT NOT NULL DEFAULT '',
    genre TEXT NOT NULL DEFAULT '',
    composer TEXT NOT NULL DEFAULT '',
    comments TEXT NOT NULL DEFAULT '',
    track_number INTEGER,
    track_count INTEGER,
    disc_number INTEGER,
    disc_count INTEGER,
    year INTEGER,
    rating INTEGER NOT NULL DEFAULT 0,
    play_count INTEGER NOT NULL DEFAULT 0,
    last_played INTEGER,
    date_added INTEGER NOT NULL,
    date_modified INTEGER,
    duration_ms INTEGER,
    bit_rate INTEGER,
    sample_rate INTEGER,
    size INTEGER,
    kind TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS tombstones (
    song_id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    removed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS updates (
    updated_at INTEGER NOT NULL
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
